mod common;

#[test]
fn counter() {
    common::assert_fixture("tests/fixtures/closure/counter.lox");
}
