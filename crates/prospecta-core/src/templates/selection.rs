//! Template scoring and selection
//!
//! Selection is deterministic: ties always resolve to the template seen first.

use prospecta_common::types::TemplateCategory;
use prospecta_storage::models::{EmailTemplate, TemplatePerformance};
use std::cmp::Ordering;

const RESPONSE_WEIGHT: f64 = 0.4;
const CONVERSION_WEIGHT: f64 = 0.4;
const OPEN_WEIGHT: f64 = 0.1;
const CLICK_WEIGHT: f64 = 0.1;

/// Weighted performance score; templates without metrics score 0
pub fn score(performance: Option<&TemplatePerformance>) -> f64 {
    match performance {
        Some(p) => {
            RESPONSE_WEIGHT * p.response_rate
                + CONVERSION_WEIGHT * p.conversion_rate
                + OPEN_WEIGHT * p.open_rate
                + CLICK_WEIGHT * p.click_rate
        }
        None => 0.0,
    }
}

pub fn template_score(template: &EmailTemplate) -> f64 {
    score(template.performance.as_ref())
}

/// Highest scoring template, first one wins on ties
pub fn select_best<'a, I>(templates: I) -> Option<&'a EmailTemplate>
where
    I: IntoIterator<Item = &'a EmailTemplate>,
{
    let mut best: Option<(&EmailTemplate, f64)> = None;

    for template in templates {
        let s = template_score(template);
        match best {
            Some((_, best_score)) if s <= best_score => {}
            _ => best = Some((template, s)),
        }
    }

    best.map(|(template, _)| template)
}

/// Best active variant among templates whose key starts with `base_key`
pub fn select_variant<'a>(templates: &'a [EmailTemplate], base_key: &str) -> Option<&'a EmailTemplate> {
    select_best(
        templates
            .iter()
            .filter(|t| t.is_active && t.key.starts_with(base_key)),
    )
}

/// Active templates applicable to `segment`, best first.
///
/// Ordered by score, then priority (high before low); equal entries keep
/// their input order.
pub fn recommend_for_segment<'a>(
    templates: &'a [EmailTemplate],
    segment: &str,
    category: Option<TemplateCategory>,
) -> Vec<&'a EmailTemplate> {
    let mut matches: Vec<&EmailTemplate> = templates
        .iter()
        .filter(|t| t.is_active && t.targets_segment(segment))
        .filter(|t| category.map_or(true, |c| t.category == c))
        .collect();

    matches.sort_by(|a, b| {
        template_score(b)
            .partial_cmp(&template_score(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.priority.rank().cmp(&a.priority.rank()))
    });

    matches
}
