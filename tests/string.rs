mod common;

#[test]
fn concatenation() {
    common::assert_fixture("tests/fixtures/string/concatenation.lox");
}
