//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Tether Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[shell]
# program = ""           # empty = $SHELL
# args = []
# login_shell = true

[shell.env]
# EDITOR = "nvim"

[sessions]
# detach = true          # keep sessions alive in a tmux socket per session
# tmux_program = "tmux"

[storage]
# data_dir = "/path/to/state"   # default: platform data dir

[parser]
# max_marker_len = 1024  # 16-65536

[events]
# capacity = 256         # 1-65536

[logging]
# level = "INFO"         # TRACE, DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
