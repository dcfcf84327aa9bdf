//! Output formatting utilities

use console::{style, Style};
use playdeck_core::{
    AppDetails, AppInfo, BatchDeploymentResult, DeploymentResult, ExpansionFile, InAppProduct,
    Listing, Order, ReleaseStatus, Review, SubscriptionProduct, SubscriptionPurchase, Testers,
    TrackReleases, ValidationReport, VitalsMetric, VitalsMetricKind, VitalsOverview,
    VoidedPurchase,
};
use serde::Serialize;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("→").blue(), message);
}

/// Create a styled header
pub fn header(text: &str) -> String {
    style(text).bold().to_string()
}

/// Create a styled key-value line
pub fn key_value(key: &str, value: &str) -> String {
    format!("  {}: {}", style(key).dim(), value)
}

/// Style for version codes
pub fn version_style() -> Style {
    Style::new().green().bold()
}

/// Style for paths
pub fn path_style() -> Style {
    Style::new().cyan()
}

/// Pretty-print a value as JSON on stdout
pub fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status_style(status: ReleaseStatus) -> Style {
    match status {
        ReleaseStatus::Completed => Style::new().green(),
        ReleaseStatus::InProgress => Style::new().yellow(),
        ReleaseStatus::Halted => Style::new().red(),
        ReleaseStatus::Draft | ReleaseStatus::Unknown => Style::new().dim(),
    }
}

/// Print the outcome of a release operation
pub fn deployment(result: &DeploymentResult) {
    success(&result.message);
    println!("{}", key_value("Package", &result.package_name));
    println!("{}", key_value("Track", result.track.as_str()));
    println!(
        "{}",
        key_value(
            "Version code",
            &version_style().apply_to(result.version_code).to_string()
        )
    );
    println!(
        "{}",
        key_value(
            "Status",
            &status_style(result.status).apply_to(result.status).to_string()
        )
    );
    println!(
        "{}",
        key_value("Rollout", &format!("{}%", result.rollout_percentage))
    );
}

/// Print releases grouped by track
pub fn releases(package_name: &str, tracks: &[TrackReleases]) {
    println!("{}", header(&format!("Releases for {}", package_name)));
    for track in tracks {
        println!();
        println!("{}", style(track.track.as_str()).bold().underlined());

        if let Some(err) = &track.error {
            println!("  {} {}", style("✗").red(), err.message);
            continue;
        }
        if track.releases.is_empty() {
            println!("  {}", style("no releases").dim());
            continue;
        }

        for release in &track.releases {
            let codes: Vec<String> = release.version_codes.iter().map(i64::to_string).collect();
            println!(
                "  {} {} {}",
                version_style().apply_to(codes.join(", ")),
                status_style(release.status).apply_to(release.status),
                style(format!("{}%", release.rollout_percentage)).dim()
            );
            if let Some(name) = &release.name {
                println!("{}", key_value("Name", name));
            }
            for (language, text) in release.release_notes.iter() {
                println!("{}", key_value(language, text));
            }
        }
    }
}

/// Print per-track batch outcomes
pub fn batch(result: &BatchDeploymentResult) {
    for outcome in &result.outcomes {
        match &outcome.result {
            Ok(deployment) => success(&format!(
                "{}: version {} ({})",
                outcome.track, deployment.version_code, deployment.status
            )),
            Err(e) => error(&format!("{}: {}", outcome.track, e)),
        }
    }
    println!();
    if result.success() {
        success(&result.message());
    } else {
        warning(&result.message());
    }
}

/// Print a store listing
pub fn listing(listing: &Listing) {
    println!("{}", header(&format!("Listing ({})", listing.language)));
    print_optional("Title", listing.title.as_deref());
    print_optional("Short description", listing.short_description.as_deref());
    print_optional("Full description", listing.full_description.as_deref());
    print_optional("Video", listing.video.as_deref());
}

/// Print app details
pub fn details(details: &AppDetails) {
    println!("{}", header(&details.package_name));
    print_optional("Title", details.title.as_deref());
    print_optional("Short description", details.short_description.as_deref());
    print_optional("Default language", details.default_language.as_deref());
    print_optional("Contact email", details.contact_email.as_deref());
    print_optional("Contact website", details.contact_website.as_deref());
    print_optional("Contact phone", details.contact_phone.as_deref());
}

/// Print the apps a service account can see
pub fn apps(apps: &[AppInfo]) {
    if apps.is_empty() {
        println!("{}", style("no apps").dim());
        return;
    }
    for app in apps {
        match &app.title {
            Some(title) => println!("{} {}", style(&app.package_name).bold(), style(title).dim()),
            None => println!("{}", style(&app.package_name).bold()),
        }
    }
}

/// Print one page of reviews
pub fn reviews(reviews: &[Review]) {
    if reviews.is_empty() {
        println!("{}", style("no reviews").dim());
        return;
    }
    for review in reviews {
        let stars = "★".repeat(usize::from(review.star_rating.min(5)));
        let stars = if review.star_rating >= 4 {
            style(stars).green()
        } else if review.star_rating == 3 {
            style(stars).yellow()
        } else {
            style(stars).red()
        };
        println!(
            "{} {} {}",
            stars,
            style(&review.author_name).bold(),
            style(&review.review_id).dim()
        );
        println!("  {}", review.comment);
        if let Some(version) = &review.app_version_name {
            println!("{}", key_value("Version", version));
        }
        if let Some(reply) = &review.developer_reply {
            println!("{}", key_value("Reply", reply));
        }
        println!();
    }
}

fn rate(value: Option<f64>, kind: VitalsMetricKind) -> String {
    match value {
        Some(v) if v < kind.bad_behavior_threshold() => {
            style(format!("{:.3}%", v * 100.0)).green().to_string()
        }
        Some(v) => style(format!("{:.3}%", v * 100.0)).red().to_string(),
        None => style("-").dim().to_string(),
    }
}

/// Print the latest value of every vitals metric
pub fn vitals_overview(overview: &VitalsOverview) {
    println!("{}", header(&format!("Vitals for {}", overview.package_name)));
    for kind in VitalsMetricKind::ALL {
        println!("{}", key_value(kind.as_str(), &rate(overview.get(kind), kind)));
    }
    print_optional("Data as of", overview.freshness.as_deref());
}

/// Print one metric per dimension value
pub fn vitals_metrics(metrics: &[VitalsMetric]) {
    if metrics.is_empty() {
        println!("{}", style("no data").dim());
        return;
    }
    for metric in metrics {
        let label = metric.dimension_value.as_deref().unwrap_or("all");
        println!("{}", key_value(label, &rate(metric.value, metric.metric_type)));
    }
}

/// Print tester groups of a track
pub fn testers(testers: &Testers) {
    println!("{}", header(&format!("Testers ({})", testers.track)));
    if testers.google_groups.is_empty() {
        println!("  {}", style("none").dim());
    }
    for group in &testers.google_groups {
        println!("  {}", group);
    }
}

/// Print an expansion file lookup
pub fn expansion_file(file: &ExpansionFile) {
    println!(
        "{}",
        header(&format!("{} expansion file of {}", file.file_type, file.version_code))
    );
    match (file.file_size, file.references_version) {
        (None, None) => println!("  {}", style("none").dim()),
        (size, references) => {
            if let Some(size) = size {
                println!("{}", key_value("Size", &format!("{} bytes", size)));
            }
            if let Some(version) = references {
                println!("{}", key_value("Reuses version", &version.to_string()));
            }
        }
    }
}

/// Print subscription products with their base plans
pub fn subscriptions(products: &[SubscriptionProduct]) {
    if products.is_empty() {
        println!("{}", style("no subscriptions").dim());
        return;
    }
    for product in products {
        println!("{}", style(&product.product_id).bold());
        for plan in &product.base_plans {
            println!(
                "{}",
                key_value(&plan.base_plan_id, plan.state.as_deref().unwrap_or("-"))
            );
        }
    }
}

/// Print a subscription purchase
pub fn purchase(purchase: &SubscriptionPurchase) {
    println!("{}", header(&purchase.subscription_id));
    print_optional("State", purchase.state.as_deref());
    print_optional("Order", purchase.order_id.as_deref());
    print_optional(
        "Started",
        purchase.start_time.map(|t| t.to_rfc3339()).as_deref(),
    );
    print_optional(
        "Expires",
        purchase.expiry_time.map(|t| t.to_rfc3339()).as_deref(),
    );
    println!(
        "{}",
        key_value("Auto-renewing", if purchase.auto_renewing { "yes" } else { "no" })
    );
}

/// Print voided purchases
pub fn voided(purchases: &[VoidedPurchase]) {
    if purchases.is_empty() {
        println!("{}", style("no voided purchases").dim());
        return;
    }
    for purchase in purchases {
        let when = purchase
            .voided_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {} {}",
            style(purchase.order_id.as_deref().unwrap_or("-")).bold(),
            when,
            style(&purchase.purchase_token).dim()
        );
    }
}

/// Print in-app products, one per line
pub fn products(products: &[InAppProduct]) {
    if products.is_empty() {
        println!("{}", style("no in-app products").dim());
        return;
    }
    for p in products {
        println!(
            "{} {} {}",
            style(&p.sku).bold(),
            p.title.as_deref().unwrap_or("-"),
            style(p.status.as_deref().unwrap_or("-")).dim()
        );
    }
}

/// Print one in-app product
pub fn product(product: &InAppProduct) {
    println!("{}", header(&product.sku));
    println!("{}", key_value("Type", &product.product_type));
    print_optional("Status", product.status.as_deref());
    print_optional("Title", product.title.as_deref());
    print_optional("Description", product.description.as_deref());
    let price = product
        .default_price
        .as_ref()
        .map(|p| format!("{} micros {}", p.price_micros, p.currency));
    print_optional("Default price", price.as_deref());
}

/// Print an order
pub fn order(order: &Order) {
    println!("{}", header(&order.order_id));
    print_optional("Product", order.product_id.as_deref());
    print_optional("State", order.state.as_deref());
    print_optional("Purchase token", order.purchase_token.as_deref());
}

/// Print every violated rule of a report
pub fn violations(report: &ValidationReport) {
    for issue in report.iter() {
        error(&format!("{}: {} ({})", issue.field, issue.message, issue.value));
    }
}

fn print_optional(key: &str, value: Option<&str>) {
    let value = match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => style("-").dim().to_string(),
    };
    println!("{}", key_value(key, &value));
}
