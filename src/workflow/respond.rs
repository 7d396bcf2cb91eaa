//! Response composer
//!
//! Builds every user-visible message. Success text comes from the user's
//! saved template when they have one, else the stock acknowledgment; both
//! styles always surface store, total, date, category, and item count.
//! Pure string work, no I/O.

use crate::error::FailureClass;
use crate::models::NormalizedReceipt;

/// Posted immediately when a receipt photo arrives, then edited in place.
pub const PROCESSING_TEXT: &str = "👀 Processing Receipt...";

/// Reply to the manual profile sync command.
pub const SYNC_CONFIRMATION: &str = "🔄 Profile synced.";

const DEFAULT_TEMPLATE: &str = "✅ Saved! {glyph} {store}: {total} on {date} ({category}, {items})";

/// Placeholders a custom template must use for the acknowledgment to be
/// self-contained. Templates missing any of these get the stock summary
/// appended so the required facts always reach the user.
const REQUIRED_PLACEHOLDERS: [&str; 5] = ["{store}", "{total}", "{date}", "{category}", "{items}"];

/// Build the success acknowledgment.
pub fn compose_success(
    template: Option<&str>,
    receipt: &NormalizedReceipt,
    item_count: usize,
) -> String {
    match template.map(str::trim).filter(|t| !t.is_empty()) {
        Some(custom) => {
            let rendered = render(custom, receipt, item_count);
            if REQUIRED_PLACEHOLDERS.iter().all(|p| custom.contains(p)) {
                rendered
            } else {
                format!("{}\n{}", rendered, render(DEFAULT_TEMPLATE, receipt, item_count))
            }
        }
        None => render(DEFAULT_TEMPLATE, receipt, item_count),
    }
}

/// One line per failure class, in the bot's voice.
pub fn compose_failure(class: FailureClass) -> &'static str {
    match class {
        FailureClass::Storage => {
            "❌ I couldn't save your receipt image (storage error). Please try again."
        }
        FailureClass::Extraction => {
            "❌ The receipt reader is unavailable right now (extraction failed). Please try again later."
        }
        FailureClass::Schema => "❌ I couldn't read that receipt.",
        FailureClass::Persistence => {
            "❌ I read your receipt but couldn't save it (database error). Please try again."
        }
    }
}

fn render(template: &str, receipt: &NormalizedReceipt, item_count: usize) -> String {
    template
        .replace("{store}", receipt.store_label())
        .replace("{total}", &format_money(receipt.total_amount))
        .replace("{date}", &receipt.date_label())
        .replace("{category}", receipt.category.label())
        .replace("{glyph}", receipt.category.glyph())
        .replace("{items}", &format_items(item_count))
}

fn format_money(amount: f64) -> String {
    format!("${:.2}", amount)
}

fn format_items(count: usize) -> String {
    if count == 1 {
        "1 item".to_string()
    } else {
        format!("{} items", count)
    }
}
