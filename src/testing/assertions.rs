//! Assertion functions for composition results.

use crate::composer::Deployment;

/// Assert the exact instantiation order.
///
/// # Panics
///
/// Panics if the order differs.
///
/// # Example
///
/// ```
/// use tiergraph::Composer;
/// use tiergraph::testing::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let deployment = Composer::new(two_component_registry()?)
///     .compose(&profile_for("qa"), &FakeResourceProvider::new())?;
/// assert_order(&deployment, &["db", "app"]);
/// # Ok(())
/// # }
/// ```
pub fn assert_order(deployment: &Deployment, expected: &[&str]) {
    let actual = deployment.order();
    assert_eq!(
        actual, expected,
        "Instantiation order mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert that `component` was provisioned.
///
/// # Panics
///
/// Panics if the component is unknown or absent.
pub fn assert_present(deployment: &Deployment, component: &str) {
    let instance = deployment
        .get(component)
        .unwrap_or_else(|| panic!("Component `{component}` is not in the deployment: {:?}", deployment.order()));
    assert!(
        instance.is_present(),
        "Component `{component}` should be present but is absent\n  Absent: {:?}",
        deployment.absent()
    );
}

/// Assert that `component` was gated out and every output is unresolved.
///
/// # Panics
///
/// Panics if the component is unknown, present, or exposes a resolved output.
pub fn assert_absent(deployment: &Deployment, component: &str) {
    let instance = deployment
        .get(component)
        .unwrap_or_else(|| panic!("Component `{component}` is not in the deployment: {:?}", deployment.order()));
    assert!(
        !instance.is_present(),
        "Component `{component}` should be absent but is present\n  Present: {:?}",
        deployment.present()
    );
    if let Some((name, value)) = instance.outputs().iter().find(|(_, v)| v.is_resolved()) {
        panic!("Absent component `{component}` exposes resolved output `{name}` = {value:?}");
    }
}

/// Assert that `component.input` equals `upstream.output` exactly.
///
/// # Panics
///
/// Panics if either side is missing or the values differ.
pub fn assert_wired(deployment: &Deployment, component: &str, input: &str, upstream: &str, output: &str) {
    let actual = deployment
        .get(component)
        .and_then(|c| c.input(input))
        .unwrap_or_else(|| panic!("No input `{component}.{input}`"));
    let expected = deployment
        .output(upstream, output)
        .unwrap_or_else(|| panic!("No output `{upstream}.{output}`"));
    assert_eq!(
        actual, expected,
        "Wiring mismatch for `{component}.{input}` <- `{upstream}.{output}`"
    );
}
