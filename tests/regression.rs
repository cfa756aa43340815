mod common;

#[test]
fn division_by_zero_exits_70() {
    common::assert_exit_code("tests/fixtures/regression/division_by_zero.lox", 70);
}

#[test]
fn parse_error_exits_65() {
    common::assert_exit_code("tests/fixtures/regression/parse_error.lox", 65);
}

#[test]
fn closure_captures_the_environment_at_declaration_not_call() {
    common::assert_fixture("tests/fixtures/regression/scenario_closure_captures_declaration_site.lox");
}

#[test]
fn initializer_early_return_still_yields_instance_but_field_is_unset() {
    common::assert_exit_code("tests/fixtures/regression/scenario_initializer_early_return.lox", 70);
}
