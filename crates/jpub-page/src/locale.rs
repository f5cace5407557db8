//! Locales and locale-keyed page properties.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A language with optional country and variant, e.g. `en_US_POSIX`.
///
/// Parsed from `en`, `en_US`, `en-US` or `en_US_POSIX`. The language is
/// lowercased and the country uppercased; the variant is kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    language: String,
    country: Option<String>,
    variant: Option<String>,
}

/// Error returned when a locale string has no language.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid locale '{0}': missing language")]
pub struct InvalidLocale(String);

impl Locale {
    /// Create a locale for a language.
    #[must_use]
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into().to_lowercase(),
            country: None,
            variant: None,
        }
    }

    /// Set the country code.
    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into().to_uppercase()).filter(|c| !c.is_empty());
        self
    }

    /// Set the variant.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into()).filter(|v| !v.is_empty());
        self
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// Property keys to try for this locale, most specific first.
    ///
    /// `en_US_POSIX` yields `en_US_POSIX`, `en_US`, `en`, then the default
    /// key `""`.
    #[must_use]
    pub fn candidates(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(4);
        if self.variant.is_some() {
            keys.push(self.to_string());
        }
        if let Some(country) = &self.country {
            keys.push(format!("{}_{country}", self.language));
        }
        keys.push(self.language.clone());
        keys.push(String::new());
        keys
    }
}

impl FromStr for Locale {
    type Err = InvalidLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, ['_', '-']);
        let language = parts.next().unwrap_or_default();
        if language.is_empty() {
            return Err(InvalidLocale(s.to_owned()));
        }

        let mut locale = Self::new(language);
        if let Some(country) = parts.next() {
            locale = locale.with_country(country);
        }
        if let Some(variant) = parts.next() {
            locale = locale.with_variant(variant);
        }
        Ok(locale)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)?;
        match (&self.country, &self.variant) {
            (Some(country), Some(variant)) => write!(f, "_{country}_{variant}"),
            (Some(country), None) => write!(f, "_{country}"),
            (None, Some(variant)) => write!(f, "__{variant}"),
            (None, None) => Ok(()),
        }
    }
}

/// Normalize a locale attribute to its property key. Blank means default.
fn locale_key(locale: &str) -> String {
    locale
        .parse::<Locale>()
        .map(|l| l.to_string())
        .unwrap_or_default()
}

/// A named page property with one value per locale.
///
/// The value stored under the empty key is the default, used when no
/// locale-specific value matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageProperty {
    name: String,
    values: HashMap<String, String>,
}

impl PageProperty {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the value for a locale string (`""` for the default value).
    pub fn set_value(&mut self, locale: &str, value: impl Into<String>) {
        self.values.insert(locale_key(locale), value.into());
    }

    /// Resolve the value for a locale.
    ///
    /// `None` locale returns the default value. Otherwise the lookup degrades
    /// from the full locale through country and language to the default.
    #[must_use]
    pub fn value(&self, locale: Option<&Locale>) -> Option<&str> {
        let Some(locale) = locale else {
            return self.values.get("").map(String::as_str);
        };
        locale
            .candidates()
            .iter()
            .find_map(|key| self.values.get(key))
            .map(String::as_str)
    }

    /// Locale keys that have a value, sorted.
    #[must_use]
    pub fn locales(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn locale(s: &str) -> Locale {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_locale_forms() {
        assert_eq!(locale("en"), Locale::new("en"));
        assert_eq!(locale("en_US"), Locale::new("en").with_country("US"));
        assert_eq!(locale("en-us"), Locale::new("en").with_country("US"));
        assert_eq!(
            locale("EN_us_POSIX"),
            Locale::new("en").with_country("US").with_variant("POSIX")
        );
    }

    #[test]
    fn test_parse_locale_empty() {
        assert!("".parse::<Locale>().is_err());
        assert!("  ".parse::<Locale>().is_err());
        assert!("_US".parse::<Locale>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(locale("en").to_string(), "en");
        assert_eq!(locale("en-US").to_string(), "en_US");
        assert_eq!(locale("en_US_POSIX").to_string(), "en_US_POSIX");
        assert_eq!(locale("no__NY").to_string(), "no__NY");
    }

    #[test]
    fn test_candidates() {
        assert_eq!(
            locale("en_US_POSIX").candidates(),
            vec!["en_US_POSIX", "en_US", "en", ""]
        );
        assert_eq!(locale("fr").candidates(), vec!["fr", ""]);
    }

    #[test]
    fn test_property_degrades_to_language() {
        let mut property = PageProperty::new("greeting");
        property.set_value("en", "Hi");
        property.set_value("", "Hello");

        assert_eq!(property.value(Some(&locale("en_US"))), Some("Hi"));
        assert_eq!(property.value(Some(&locale("en_US_POSIX"))), Some("Hi"));
    }

    #[test]
    fn test_property_degrades_to_default() {
        let mut property = PageProperty::new("greeting");
        property.set_value("en", "Hi");
        property.set_value("", "Hello");

        assert_eq!(property.value(Some(&locale("fr"))), Some("Hello"));
        assert_eq!(property.value(None), Some("Hello"));
    }

    #[test]
    fn test_property_prefers_most_specific() {
        let mut property = PageProperty::new("greeting");
        property.set_value("en", "Hi");
        property.set_value("en-GB", "Hiya");

        assert_eq!(property.value(Some(&locale("en_GB"))), Some("Hiya"));
        assert_eq!(property.value(Some(&locale("en_US"))), Some("Hi"));
    }

    #[test]
    fn test_property_no_match() {
        let mut property = PageProperty::new("greeting");
        property.set_value("fr", "Bonjour");

        assert_eq!(property.value(Some(&locale("en"))), None);
        assert_eq!(property.value(None), None);
    }

    #[test]
    fn test_property_locales() {
        let mut property = PageProperty::new("greeting");
        property.set_value("fr", "Bonjour");
        property.set_value("", "Hello");
        property.set_value("en-us", "Howdy");

        assert_eq!(property.locales(), vec!["", "en_US", "fr"]);
    }
}
