mod common;

#[test]
fn arithmetic() {
    common::assert_fixture("tests/fixtures/operator/arithmetic.lox");
}

#[test]
fn comparison_and_equality() {
    common::assert_fixture("tests/fixtures/operator/comparison_and_equality.lox");
}
