mod common;

#[test]
fn init_returns_this() {
    common::assert_fixture("tests/fixtures/constructor/init_returns_this.lox");
}
