//! List the built-in marketplace profiles.

use console::style;

use crate::profile::{ProfileRegistry, SpecSelectors};

pub fn cmd_profiles() -> anyhow::Result<()> {
    let registry = ProfileRegistry::builtin();

    println!("{}", style("Marketplaces").bold());
    for profile in registry.profiles() {
        let specs = match profile.specifications {
            SpecSelectors::Table { .. } => "table",
            SpecSelectors::Markup { .. } => "markup",
        };
        println!(
            "  {} {:<10} host contains '{}'",
            style("•").cyan(),
            profile.marketplace,
            profile.host_keyword
        );
        println!(
            "      {} title selectors, {} readiness, {} expanders, specs as {}",
            profile.fields.title.len(),
            profile.readiness.len(),
            profile.expanders.len(),
            specs
        );
    }
    Ok(())
}
