mod common;

#[test]
fn and_or() {
    common::assert_fixture("tests/fixtures/logical_operator/and_or.lox");
}
