//! Basic smoke test to verify the public API is exported.

#[test]
fn crate_compiles() {
    // If this test runs, the public surface is wired up.
    let _ = std::any::type_name::<punchgate::PunchConfig>();
    let _ = std::any::type_name::<punchgate::PunchError>();
    let _ = std::any::type_name::<punchgate::PunchManager>();
    let _ = std::any::type_name::<punchgate::ValidatorChain>();
}
