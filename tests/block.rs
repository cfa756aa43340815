mod common;

#[test]
fn scoping() {
    common::assert_fixture("tests/fixtures/block/scoping.lox");
}

#[test]
fn empty() {
    common::assert_fixture("tests/fixtures/block/empty.lox");
}
