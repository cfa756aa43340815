mod common;

#[test]
fn line_and_block() {
    common::assert_fixture("tests/fixtures/comment/line_and_block.lox");
}

#[test]
fn unterminated_nested_comment_is_a_scan_error() {
    common::assert_exit_code("tests/fixtures/comment/unterminated_nested.lox", 65);
}
