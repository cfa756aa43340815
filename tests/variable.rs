mod common;

#[test]
fn shadowing_and_scope() {
    common::assert_fixture("tests/fixtures/variable/shadowing_and_scope.lox");
}
