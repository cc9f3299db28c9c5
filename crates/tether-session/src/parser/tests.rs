use super::*;

fn summary(parser: &BlockParser) -> Vec<(BlockKind, String, Option<String>, bool)> {
    parser
        .blocks()
        .iter()
        .map(|b| {
            (
                b.kind(),
                b.content().to_string(),
                b.label().map(str::to_string),
                b.is_complete(),
            )
        })
        .collect()
}

#[test]
fn command_tool_call_and_continuation_make_three_blocks() {
    let mut parser = BlockParser::default();
    parser.feed(b"\x1b]133;A\x07$ ls\n");
    parser.feed(b"\x1b]7733;tool-call;Read\x07Read(src/main.rs)\n");
    parser.feed(b"\x1b]7733;end\x07");
    parser.feed(b"done reading\n");

    let blocks = parser.blocks();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].kind(), BlockKind::Command);
    assert_eq!(blocks[0].content(), "$ ls\n");
    assert!(blocks[0].is_complete());
    assert_eq!(blocks[1].kind(), BlockKind::ToolCall);
    assert_eq!(blocks[1].label(), Some("Read"));
    assert_eq!(blocks[1].content(), "Read(src/main.rs)\n");
    assert!(blocks[1].is_complete());
    assert_eq!(blocks[2].kind(), BlockKind::Output);
    assert_eq!(blocks[2].content(), "done reading\n");
    assert!(!blocks[2].is_complete(), "still streaming until a terminator or flush");

    let events = parser.flush();
    assert_eq!(events, vec![ParseEvent::BlockCompleted(blocks_id(&parser, 2))]);
    assert!(parser.blocks()[2].is_complete());
    assert!(parser.open_block().is_none());
}

fn blocks_id(parser: &BlockParser, idx: usize) -> BlockId {
    parser.blocks()[idx].id()
}

#[test]
fn plain_text_opens_implicit_output_block() {
    let mut parser = BlockParser::default();
    let events = parser.feed(b"hello");
    assert_eq!(events, vec![ParseEvent::BlockOpened(BlockId(1))]);

    let events = parser.feed(b" world");
    assert_eq!(events, vec![ParseEvent::BlockUpdated(BlockId(1))]);

    assert_eq!(
        summary(&parser),
        vec![(BlockKind::Output, "hello world".into(), None, false)]
    );
}

#[test]
fn text_after_end_marker_starts_a_new_block() {
    let mut parser = BlockParser::default();
    parser.feed(b"\x1b]7733;agent-response\x07Sure.\x1b]7733;end\x07more");

    assert_eq!(
        summary(&parser),
        vec![
            (BlockKind::AgentResponse, "Sure.".into(), None, true),
            (BlockKind::Output, "more".into(), None, false),
        ]
    );
}

#[test]
fn prompt_then_command_start_share_one_command_block() {
    let mut parser = BlockParser::default();
    parser.feed(b"\x1b]133;A\x07$ \x1b]133;B\x07make\n\x1b]133;C\x07ok\n");

    assert_eq!(
        summary(&parser),
        vec![
            (BlockKind::Command, "$ make\n".into(), None, true),
            (BlockKind::Output, "ok\n".into(), None, false),
        ]
    );
}

#[test]
fn non_zero_exit_appends_error_block() {
    let mut parser = BlockParser::default();
    parser.feed(b"\x1b]133;C\x07boom\n\x1b]133;D;2\x07");

    assert_eq!(
        summary(&parser),
        vec![
            (BlockKind::Output, "boom\n".into(), None, true),
            (
                BlockKind::Error,
                "command exited with status 2".into(),
                Some("exit 2".into()),
                true
            ),
        ]
    );
}

#[test]
fn zero_exit_only_completes() {
    let mut parser = BlockParser::default();
    parser.feed(b"\x1b]133;C\x07fine\n\x1b]133;D;0\x07");
    assert_eq!(
        summary(&parser),
        vec![(BlockKind::Output, "fine\n".into(), None, true)]
    );
}

#[test]
fn control_sequences_pass_through_verbatim() {
    let input = b"\x1b[31mred\x1b[0m\r\n\x1b]0;title\x07\x08\x1b7";
    let mut parser = BlockParser::default();
    parser.feed(input);

    let blocks = parser.blocks();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].kind(), BlockKind::Output);
    assert_eq!(blocks[0].content().as_bytes(), input);
}

#[test]
fn string_terminator_is_accepted() {
    let mut parser = BlockParser::default();
    parser.feed(b"\x1b]7733;system\x1b\\booting");
    assert_eq!(
        summary(&parser),
        vec![(BlockKind::System, "booting".into(), None, false)]
    );
}

#[test]
fn unknown_block_kind_stays_literal_output() {
    let input = b"\x1b]7733;thinking\x07hmm";
    let mut parser = BlockParser::default();
    parser.feed(input);
    assert_eq!(parser.blocks().len(), 1);
    assert_eq!(parser.blocks()[0].kind(), BlockKind::Output);
    assert_eq!(parser.blocks()[0].content().as_bytes(), input);
}

#[test]
fn overlong_osc_is_literal() {
    let mut input = b"\x1b]".to_vec();
    input.extend(std::iter::repeat(b'x').take(40));
    input.push(BEL);

    let mut parser = BlockParser::new(16);
    parser.feed(&input);
    assert_eq!(parser.blocks().len(), 1);
    assert_eq!(parser.blocks()[0].content().as_bytes(), input.as_slice());
}

#[test]
fn malformed_osc_is_literal() {
    let input = b"\x1b]133;A\x1bXafter";
    let mut parser = BlockParser::default();
    parser.feed(input);
    assert_eq!(parser.blocks().len(), 1);
    assert_eq!(parser.blocks()[0].kind(), BlockKind::Output);
    assert_eq!(parser.blocks()[0].content().as_bytes(), input);
}

#[test]
fn working_directory_report_is_event_and_content() {
    let input = b"\x1b]7;file://host/tmp/x\x07";
    let mut parser = BlockParser::default();
    let events = parser.feed(input);

    assert!(events.contains(&ParseEvent::WorkingDirectory(PathBuf::from("/tmp/x"))));
    assert_eq!(parser.blocks()[0].content().as_bytes(), input);
}

#[test]
fn working_directory_with_literal_percent_still_reported() {
    let mut parser = BlockParser::default();
    let events = parser.feed(b"\x1b]7;file:///tmp/100%done\x07");
    assert!(events.contains(&ParseEvent::WorkingDirectory(PathBuf::from("/tmp/100%done"))));

    let events = parser.feed(b"\x1b]7;file:///tmp/a%+1b\x07");
    assert!(events.contains(&ParseEvent::WorkingDirectory(PathBuf::from("/tmp/a%+1b"))));
}

#[test]
fn every_split_point_parses_like_a_single_feed() {
    let stream = "héllo\x1b]133;C\x1b\\wörld\x1b]0;title\x07!\x1b]7733;tool-call;Bash\x07ls\x1b]133;D;0\x07"
        .as_bytes();

    let mut whole = BlockParser::default();
    whole.feed(stream);
    let expected = summary(&whole);
    assert_eq!(expected.len(), 3);

    for split in 0..=stream.len() {
        let mut parser = BlockParser::default();
        parser.feed(&stream[..split]);
        parser.feed(&stream[split..]);
        assert_eq!(summary(&parser), expected, "split at byte {split}");
    }
}

#[test]
fn byte_at_a_time_matches_single_feed() {
    let stream = b"\x1b]133;A\x07$ echo \xe2\x9c\x93\n\x1b]133;C\x07\xe2\x9c\x93\n\x1b]133;D;1\x07";

    let mut whole = BlockParser::default();
    whole.feed(stream);

    let mut trickle = BlockParser::default();
    for byte in stream.iter() {
        trickle.feed(std::slice::from_ref(byte));
    }
    assert_eq!(summary(&trickle), summary(&whole));
    assert_eq!(whole.blocks()[1].content(), "✓\n");
}

#[test]
fn invalid_utf8_is_replaced_not_rejected() {
    let mut parser = BlockParser::default();
    parser.feed(b"ok \xff\xfe done");
    assert_eq!(parser.blocks()[0].content(), "ok \u{FFFD}\u{FFFD} done");
}

#[test]
fn flush_turns_partial_marker_into_content() {
    let mut parser = BlockParser::default();
    parser.feed(b"tail\x1b]133");
    assert_eq!(parser.blocks()[0].content(), "tail");

    parser.flush();
    assert_eq!(parser.blocks()[0].content(), "tail\x1b]133");
    assert!(parser.blocks()[0].is_complete());
}

#[test]
fn flush_finalizes_split_utf8() {
    let mut parser = BlockParser::default();
    parser.feed(b"caf\xc3");
    assert_eq!(parser.blocks()[0].content(), "caf");
    parser.flush();
    assert_eq!(parser.blocks()[0].content(), "caf\u{FFFD}");
}

#[test]
fn reset_leaves_no_residual_state_and_keeps_ids_unique() {
    let mut parser = BlockParser::default();
    parser.feed(b"\x1b]7733;system\x07boot\x1b]13");
    let first_id = parser.blocks()[0].id();

    parser.reset();
    assert!(parser.blocks().is_empty());
    assert!(parser.open_block().is_none());

    parser.feed(b"3;C\x07x");
    let blocks = parser.blocks();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].kind(), BlockKind::Output);
    assert_eq!(blocks[0].content(), "3;C\x07x");
    assert!(blocks[0].id() > first_id);
}

#[test]
fn events_report_open_update_complete() {
    let mut parser = BlockParser::default();
    assert_eq!(parser.feed(b"abc"), vec![ParseEvent::BlockOpened(BlockId(1))]);
    assert_eq!(parser.feed(b"def"), vec![ParseEvent::BlockUpdated(BlockId(1))]);
    assert_eq!(
        parser.feed(b"\x1b]7733;command\x07"),
        vec![
            ParseEvent::BlockCompleted(BlockId(1)),
            ParseEvent::BlockOpened(BlockId(2)),
        ]
    );
    assert_eq!(
        parser.feed(b"\x1b]7733;end\x07"),
        vec![ParseEvent::BlockCompleted(BlockId(2))]
    );
}
