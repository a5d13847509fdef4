use brandfeed_core::BrandDirectory;

pub(crate) fn render_brands(directory: &BrandDirectory) -> String {
    let mut lines = Vec::new();
    for (category, _) in directory.brands_by_category() {
        lines.push(format!("{category}:"));
        for parent in directory.parents().iter().filter(|p| p.category == category) {
            lines.push(format!("  {}", parent.name));
            for sub in &parent.sub_brands {
                let marker = if directory.is_tracked(&sub.name) { "*" } else { " " };
                lines.push(format!("    {marker} {:<24}@{}", sub.name, sub.account));
            }
        }
    }
    lines.push(String::new());
    lines.push(format!("tracked: {}", directory.tracked().join(", ")));
    for overlap in directory.overlaps() {
        lines.push(format!(
            "warning: alias '{}' maps to {} (was {})",
            overlap.alias, overlap.winner, overlap.replaced
        ));
    }
    lines.join("\n")
}

/// Print the brand directory grouped by category. Tracked sub-brands are
/// starred.
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn run_brands(directory: &BrandDirectory) -> anyhow::Result<()> {
    println!("{}", render_brands(directory));
    Ok(())
}
