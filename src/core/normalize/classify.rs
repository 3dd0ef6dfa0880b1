use once_cell::sync::Lazy;
use regex::Regex;

// All patterns are anchored at the start of the input.
static RE_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:((^what)|(^why)|(^how)|(^can )|(^do )|(^does)|(^where)|(^who(se)? )|(who'?s )|(^which)|(^when)|(^is )|(^are )|(.*\?$)))",
    )
    .expect("question pattern compiles")
});

static RE_TRANSACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(.*((buy)|(cost)|(price)|(cheap)|(pricing)|(affordable))))")
        .expect("transaction pattern compiles")
});

static RE_INVESTIGATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(.*((best)|(most)|(cheapest)|( vs)|( v\.s\.))))")
        .expect("investigation pattern compiles")
});

pub fn is_question(query: &str) -> bool {
    RE_QUESTION.is_match(query)
}

pub fn is_transactional(query: &str) -> bool {
    RE_TRANSACTION.is_match(query)
}

pub fn is_investigation(query: &str) -> bool {
    RE_INVESTIGATION.is_match(query)
}

pub fn is_google_organic(source: &str, medium: &str) -> bool {
    source == "google" && medium == "organic"
}

pub fn is_new_user(user_type: &str) -> bool {
    user_type == "New Visitor"
}

pub fn is_shopping_stage_all(shopping_stage: &str) -> bool {
    shopping_stage == "ALL_VISITS"
}

pub fn has_site_search(search_used: &str) -> bool {
    search_used == "Visits With Site Search"
}

/// Compiles a caller-supplied brand pattern so it only matches at the start.
pub fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})", pattern))
}
