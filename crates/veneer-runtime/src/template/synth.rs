//! Synthetic-data expansion for `{{faker.module.method}}` placeholders.
//!
//! Generator lookup goes through an immutable registry built once at first
//! use; method names follow the catalog-facing `module.method` convention
//! (e.g. `person.fullName`, `internet.email`, `lorem.sentence`). Each
//! placeholder occurrence is generated independently, so repeated
//! placeholders in an array yield varying values. Unresolvable paths are
//! left as the literal placeholder text; expansion never fails.

use fake::faker::address::en::{CityName, CountryName, StateName, ZipCode};
use fake::faker::company::en::{Bs, Buzzword, CatchPhrase, CompanyName, Industry, Profession};
use fake::faker::creditcard::en::CreditCardNumber;
use fake::faker::currency::en::{CurrencyCode, CurrencyName};
use fake::faker::internet::en::{IPv4, IPv6, Password, SafeEmail, UserAgent, Username};
use fake::faker::job::en::Title as JobTitle;
use fake::faker::lorem::en::{Paragraph, Sentence, Word, Words};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

type Generator = fn() -> String;

static SYNTH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{faker\.([a-zA-Z]+)\.([a-zA-Z]+)\}\}").unwrap());

static REGISTRY: Lazy<HashMap<&'static str, Generator>> = Lazy::new(|| {
    let entries: [(&'static str, Generator); 44] = [
        // person / name
        ("person.fullName", || Name().fake::<String>()),
        ("person.firstName", || FirstName().fake::<String>()),
        ("person.lastName", || LastName().fake::<String>()),
        ("person.jobTitle", || JobTitle().fake::<String>()),
        ("name.fullName", || Name().fake::<String>()),
        ("name.firstName", || FirstName().fake::<String>()),
        ("name.lastName", || LastName().fake::<String>()),
        // internet
        ("internet.email", || SafeEmail().fake::<String>()),
        ("internet.userName", || Username().fake::<String>()),
        ("internet.password", || Password(8..16).fake::<String>()),
        ("internet.ip", || IPv4().fake::<String>()),
        ("internet.ipv6", || IPv6().fake::<String>()),
        ("internet.userAgent", || UserAgent().fake::<String>()),
        // phone
        ("phone.number", || PhoneNumber().fake::<String>()),
        // address / location (both spellings are catalog-facing)
        ("address.city", || CityName().fake::<String>()),
        ("address.state", || StateName().fake::<String>()),
        ("address.zipCode", || ZipCode().fake::<String>()),
        ("address.country", || CountryName().fake::<String>()),
        ("location.city", || CityName().fake::<String>()),
        ("location.state", || StateName().fake::<String>()),
        ("location.zipCode", || ZipCode().fake::<String>()),
        ("location.country", || CountryName().fake::<String>()),
        // company
        ("company.name", || CompanyName().fake::<String>()),
        ("company.catchPhrase", || CatchPhrase().fake::<String>()),
        ("company.bs", || Bs().fake::<String>()),
        ("company.industry", || Industry().fake::<String>()),
        ("company.profession", || Profession().fake::<String>()),
        ("company.buzzword", || Buzzword().fake::<String>()),
        // finance
        ("finance.creditCardNumber", || CreditCardNumber().fake::<String>()),
        ("finance.currencyCode", || CurrencyCode().fake::<String>()),
        ("finance.currencyName", || CurrencyName().fake::<String>()),
        // lorem
        ("lorem.word", || Word().fake::<String>()),
        ("lorem.words", || Words(3..8).fake::<Vec<String>>().join(" ")),
        ("lorem.sentence", || Sentence(4..10).fake::<String>()),
        ("lorem.paragraph", || Paragraph(3..6).fake::<String>()),
        ("lorem.text", || Paragraph(2..4).fake::<String>()),
        // date
        ("date.past", past_date),
        ("date.future", future_date),
        ("date.recent", recent_date),
        // datatype / number / string
        ("datatype.boolean", || {
            rand::thread_rng().gen_bool(0.5).to_string()
        }),
        ("datatype.number", random_number),
        ("datatype.uuid", random_uuid),
        ("string.uuid", random_uuid),
        ("string.alphanumeric", || {
            let mut rng = rand::thread_rng();
            (0..10).map(|_| rng.sample(Alphanumeric) as char).collect()
        }),
    ];
    entries.into_iter().collect()
});

fn random_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn random_number() -> String {
    rand::thread_rng().gen_range(0..100_000).to_string()
}

fn past_date() -> String {
    let days = rand::thread_rng().gen_range(1..365);
    (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339()
}

fn future_date() -> String {
    let days = rand::thread_rng().gen_range(1..365);
    (chrono::Utc::now() + chrono::Duration::days(days)).to_rfc3339()
}

fn recent_date() -> String {
    let minutes = rand::thread_rng().gen_range(1..60 * 24);
    (chrono::Utc::now() - chrono::Duration::minutes(minutes)).to_rfc3339()
}

/// Cheap pre-check so catalogs without synthetic placeholders skip the
/// expansion walk entirely.
pub fn has_synthetic_placeholders(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains("{{faker."),
        Value::Array(items) => items.iter().any(has_synthetic_placeholders),
        Value::Object(map) => map.values().any(has_synthetic_placeholders),
        _ => false,
    }
}

/// Expand every `{{faker.module.method}}` occurrence in the tree.
pub fn expand(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(expand_string(s)),
        Value::Array(items) => Value::Array(items.iter().map(expand).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), expand(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Expand placeholders in a bare string (header values).
pub fn expand_text(s: &str) -> String {
    expand_string(s)
}

fn expand_string(s: &str) -> String {
    SYNTH_REGEX
        .replace_all(s, |caps: &regex::Captures| {
            let path = format!("{}.{}", &caps[1], &caps[2]);
            match REGISTRY.get(path.as_str()) {
                Some(generator) => generator(),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}
