use crate::constants::{BRAND_DOMAIN_SUFFIXES, UNKNOWN_LABEL};

/// Display label for a free-text brand.
///
/// Underscores become spaces, whitespace collapses, each token is title-cased
/// on whitespace and period boundaries, and trailing domain segments such as
/// `.com.au` are lowercased again. Re-normalizing a label returns it unchanged.
pub fn normalize_brand_label(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let words: Vec<String> = spaced
        .split_whitespace()
        .map(|word| {
            word.split('.')
                .map(title_case)
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect();

    let mut label = words.join(" ");
    restore_domain_suffixes(&mut label);
    label
}

/// Label used when grouping; blank or absent brands share one bucket
pub fn brand_label_or_unknown(raw: Option<&str>) -> String {
    match raw.map(normalize_brand_label) {
        Some(label) if !label.is_empty() => label,
        _ => UNKNOWN_LABEL.to_string(),
    }
}

fn title_case(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(segment.len());
            out.push(upper_single(first));
            out.extend(chars.flat_map(char::to_lowercase));
            out
        }
        None => String::new(),
    }
}

/// Uppercase of `c` when it is a single char; "ß" would become "SS" and
/// re-normalize to "Ss", so multi-char expansions keep the original.
fn upper_single(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// Lowercase known trailing domain segments, innermost last: "Shop.Com.Au" -> "Shop.com.au"
fn restore_domain_suffixes(label: &mut String) {
    let mut end = label.len();
    while let Some(dot) = label[..end].rfind('.') {
        let segment = &label[dot + 1..end];
        let known = BRAND_DOMAIN_SUFFIXES
            .iter()
            .any(|suffix| segment.eq_ignore_ascii_case(suffix));
        // Stop at the first segment that is not a domain suffix, or at the
        // brand's own name
        if !known || dot == 0 {
            break;
        }
        let lowered = segment.to_ascii_lowercase();
        label.replace_range(dot + 1..end, &lowered);
        end = dot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_cases_tokens() {
        assert_eq!(normalize_brand_label("SHOPIFY"), "Shopify");
        assert_eq!(normalize_brand_label("_shopify"), "Shopify");
        assert_eq!(normalize_brand_label("  acme   widgets "), "Acme Widgets");
        assert_eq!(normalize_brand_label("acme_widgets"), "Acme Widgets");
    }

    #[test]
    fn test_restores_domain_suffixes() {
        assert_eq!(normalize_brand_label("shopify.com"), "Shopify.com");
        assert_eq!(normalize_brand_label("SHOP.COM.AU"), "Shop.com.au");
        assert_eq!(normalize_brand_label("my.store.example"), "My.Store.Example");
        assert_eq!(normalize_brand_label("hello world.co.nz"), "Hello World.co.nz");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for raw in [
            "_shopify",
            "SHOP.COM.AU",
            "acme_widgets ltd",
            "x.io",
            ".com",
            "",
            "  ",
            "ßtore",
            "ŉorth",
            "İSTANBUL bazaar",
            "ÉCOLE",
        ] {
            let once = normalize_brand_label(raw);
            assert_eq!(normalize_brand_label(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_multi_char_uppercase_keeps_first_letter() {
        assert_eq!(normalize_brand_label("ßtore"), "ßtore");
        assert_eq!(normalize_brand_label("ŉorth"), "ŉorth");
        assert_eq!(normalize_brand_label("émile_BOUTIQUE"), "Émile Boutique");
    }

    #[test]
    fn test_spellings_collapse_to_one_label() {
        let labels: Vec<_> = ["_shopify", "Shopify", "SHOPIFY"]
            .iter()
            .map(|raw| normalize_brand_label(raw))
            .collect();
        assert!(labels.iter().all(|label| label == "Shopify"));
    }

    #[test]
    fn test_blank_brand_is_unknown() {
        assert_eq!(brand_label_or_unknown(None), "Unknown");
        assert_eq!(brand_label_or_unknown(Some(" _ ")), "Unknown");
        assert_eq!(brand_label_or_unknown(Some("acme")), "Acme");
    }
}
