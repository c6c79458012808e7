//! VAST tracker and pricing injection.
//!
//! Redirect creatives (a bare ad tag URL) are wrapped in a generated VAST 3.0
//! wrapper. XML creatives are parsed into a DOM, the first ad receives the
//! trackers, and inline ads additionally get a `<Pricing>` node whose
//! placement depends on the VAST version.

use error_stack::{Report, ResultExt};
use once_cell::sync::Lazy;
use regex::Regex;
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::constants::{DEFAULT_VAST_VERSION, PRICE_MODEL_CPM, USD};
use crate::error::ExchangeError;
use crate::tracker::OwTracker;

const VAST: &str = "VAST";
const AD: &str = "Ad";
const WRAPPER: &str = "Wrapper";
const INLINE: &str = "InLine";
const IMPRESSION: &str = "Impression";
const ERROR: &str = "Error";
const EXTENSIONS: &str = "Extensions";
const EXTENSION: &str = "Extension";
const PRICING: &str = "Pricing";
const ATTR_VERSION: &str = "version";
const ATTR_MODEL: &str = "model";
const ATTR_CURRENCY: &str = "currency";

static REDIRECT_CREATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("valid redirect creative regex"));

/// Whether the markup is a bare ad tag URL rather than VAST XML.
#[must_use]
pub fn is_redirect_creative(markup: &str) -> bool {
    REDIRECT_CREATIVE.is_match(markup.trim())
}

/// Inject trackers (and price, for inline ads) into a video creative.
///
/// # Errors
///
/// - [`ExchangeError::InvalidCreative`] when the markup is empty or not XML
/// - [`ExchangeError::MissingVastRoot`] when the root element is not `<VAST>`
/// - [`ExchangeError::MissingAdElement`] when there is no `<Ad>`
/// - [`ExchangeError::UnsupportedVastAd`] when an ad is neither wrapper nor inline
/// - [`ExchangeError::XmlSerialization`] when the mutated document cannot be written
pub fn inject_vast_trackers(
    markup: &str,
    tracker: &OwTracker,
    wrapper_ad_system: &str,
) -> Result<String, Report<ExchangeError>> {
    if is_redirect_creative(markup) {
        return Ok(redirect_wrapper(markup.trim(), tracker, wrapper_ad_system));
    }

    let mut document = VastDocument::parse(markup)?;
    let version = document.version().to_string();
    let mut ads = document.ads()?;
    let Some(ad) = ads.first_mut() else {
        return Err(Report::new(ExchangeError::MissingAdElement));
    };

    if !tracker.tracker_url.is_empty() {
        ad.insert_impression(&tracker.tracker_url);
    }
    if !tracker.error_url.is_empty() {
        ad.insert_error(&tracker.error_url);
    }
    if tracker.price != 0.0 {
        ad.upsert_pricing(
            &version,
            tracker.price,
            &tracker.price_model,
            &tracker.price_currency,
        );
    }
    drop(ads);

    document.to_xml()
}

fn redirect_wrapper(tag_url: &str, tracker: &OwTracker, ad_system: &str) -> String {
    let mut wrapper = String::with_capacity(tag_url.len() + 512);
    wrapper.push_str(r#"<VAST version="3.0"><Ad id="1"><Wrapper>"#);
    wrapper.push_str(&format!("<AdSystem>{ad_system}</AdSystem>"));
    wrapper.push_str(&format!("<VASTAdTagURI><![CDATA[{tag_url}]]></VASTAdTagURI>"));
    if !tracker.tracker_url.is_empty() {
        wrapper.push_str(&format!(
            "<Impression><![CDATA[{}]]></Impression>",
            tracker.tracker_url
        ));
    }
    if !tracker.error_url.is_empty() {
        wrapper.push_str(&format!("<Error><![CDATA[{}]]></Error>", tracker.error_url));
    }
    wrapper.push_str("<Creatives></Creatives></Wrapper></Ad></VAST>");
    wrapper
}

/// Parsed VAST creative.
#[derive(Debug, Clone)]
pub struct VastDocument {
    root: Element,
    declaration: bool,
}

impl VastDocument {
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidCreative`] for empty or malformed
    /// markup and [`ExchangeError::MissingVastRoot`] for a non-VAST root.
    pub fn parse(markup: &str) -> Result<Self, Report<ExchangeError>> {
        let trimmed = markup.trim();
        if trimmed.is_empty() {
            return Err(Report::new(ExchangeError::InvalidCreative {
                message: "empty creative".to_string(),
            }));
        }

        let root = Element::parse(trimmed.as_bytes()).map_err(|e| {
            Report::new(ExchangeError::InvalidCreative {
                message: e.to_string(),
            })
        })?;
        if root.name != VAST {
            return Err(Report::new(ExchangeError::MissingVastRoot));
        }

        Ok(Self {
            root,
            declaration: trimmed.starts_with("<?xml"),
        })
    }

    /// `version` attribute of the root, `2.0` when absent.
    #[must_use]
    pub fn version(&self) -> &str {
        self.root
            .attributes
            .get(ATTR_VERSION)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VAST_VERSION)
    }

    /// Bodies of every `<Ad>`, wrapper checked before inline.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::MissingAdElement`] when there is no ad and
    /// [`ExchangeError::UnsupportedVastAd`] when an ad has neither body.
    pub fn ads(&mut self) -> Result<Vec<AdBody<'_>>, Report<ExchangeError>> {
        let ads = self
            .root
            .children
            .iter_mut()
            .filter_map(|node| match node {
                XMLNode::Element(element) if element.name == AD => Some(element),
                _ => None,
            })
            .map(AdBody::from_ad)
            .collect::<Result<Vec<_>, _>>()?;

        if ads.is_empty() {
            return Err(Report::new(ExchangeError::MissingAdElement));
        }
        Ok(ads)
    }

    /// Serialize the document, keeping the XML declaration only if the
    /// input had one.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::XmlSerialization`] if writing fails.
    pub fn to_xml(&self) -> Result<String, Report<ExchangeError>> {
        let config = EmitterConfig::new()
            .perform_indent(false)
            .write_document_declaration(self.declaration);

        let mut out = Vec::new();
        self.root.write_with_config(&mut out, config).map_err(|e| {
            Report::new(ExchangeError::XmlSerialization {
                message: e.to_string(),
            })
        })?;

        String::from_utf8(out).change_context(ExchangeError::XmlSerialization {
            message: "serialized VAST is not UTF-8".to_string(),
        })
    }
}

/// Which body an `<Ad>` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdKind {
    Wrapper,
    InLine,
}

impl AdKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Wrapper => WRAPPER,
            Self::InLine => INLINE,
        }
    }
}

/// Mutable view of one ad's `<Wrapper>` or `<InLine>` element.
#[derive(Debug)]
pub struct AdBody<'a> {
    kind: AdKind,
    element: &'a mut Element,
}

impl<'a> AdBody<'a> {
    fn from_ad(ad: &'a mut Element) -> Result<Self, Report<ExchangeError>> {
        let kind = if ad.get_child(WRAPPER).is_some() {
            AdKind::Wrapper
        } else if ad.get_child(INLINE).is_some() {
            AdKind::InLine
        } else {
            return Err(Report::new(ExchangeError::UnsupportedVastAd));
        };

        let element = ad
            .get_mut_child(kind.tag())
            .ok_or_else(|| Report::new(ExchangeError::UnsupportedVastAd))?;
        Ok(Self { kind, element })
    }

    /// Add an `<Impression>` ahead of any existing one.
    pub fn insert_impression(&mut self, url: &str) {
        insert_before_first(self.element, cdata_element(IMPRESSION, url));
    }

    /// Add an `<Error>` ahead of any existing one.
    pub fn insert_error(&mut self, url: &str) {
        insert_before_first(self.element, cdata_element(ERROR, url));
    }

    /// Create or update the price node of an inline ad. Wrappers never
    /// carry a price.
    ///
    /// VAST 2 keeps it under `Extensions/Extension/Pricing`; later versions
    /// use a direct `<Pricing>` child. An existing node is updated in place.
    pub fn upsert_pricing(&mut self, version: &str, price: f64, model: &str, currency: &str) {
        if self.kind != AdKind::InLine {
            return;
        }

        let pricing = PricingNode {
            text: format_go_float(price),
            model: if model.is_empty() { PRICE_MODEL_CPM } else { model },
            currency: if currency.is_empty() { USD } else { currency },
        };

        if is_vast_2(version) {
            upsert_extension_pricing(self.element, &pricing);
        } else if let Some(existing) = self.element.get_mut_child(PRICING) {
            pricing.apply(existing);
        } else {
            self.element
                .children
                .push(XMLNode::Element(pricing.to_element()));
        }
    }
}

struct PricingNode<'a> {
    text: String,
    model: &'a str,
    currency: &'a str,
}

impl PricingNode<'_> {
    fn apply(&self, element: &mut Element) {
        element
            .attributes
            .insert(ATTR_MODEL.to_string(), self.model.to_string());
        element
            .attributes
            .insert(ATTR_CURRENCY.to_string(), self.currency.to_string());
        element.children = vec![XMLNode::CData(self.text.clone())];
    }

    fn to_element(&self) -> Element {
        let mut element = Element::new(PRICING);
        self.apply(&mut element);
        element
    }
}

fn upsert_extension_pricing(body: &mut Element, pricing: &PricingNode<'_>) {
    if body.get_child(EXTENSIONS).is_none() {
        body.children
            .push(XMLNode::Element(Element::new(EXTENSIONS)));
    }
    let Some(extensions) = body.get_mut_child(EXTENSIONS) else {
        return;
    };

    let existing = extensions.children.iter_mut().find_map(|node| match node {
        XMLNode::Element(extension) if extension.name == EXTENSION => {
            extension.get_mut_child(PRICING)
        }
        _ => None,
    });

    match existing {
        Some(node) => pricing.apply(node),
        None => {
            let mut extension = Element::new(EXTENSION);
            extension
                .children
                .push(XMLNode::Element(pricing.to_element()));
            extensions.children.push(XMLNode::Element(extension));
        }
    }
}

fn is_vast_2(version: &str) -> bool {
    version.trim().split('.').next() == Some("2")
}

fn cdata_element(name: &str, content: &str) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::CData(content.to_string()));
    element
}

fn insert_before_first(parent: &mut Element, child: Element) {
    let position = parent
        .children
        .iter()
        .position(|node| matches!(node, XMLNode::Element(e) if e.name == child.name));
    match position {
        Some(index) => parent.children.insert(index, XMLNode::Element(child)),
        None => parent.children.push(XMLNode::Element(child)),
    }
}

/// Format a float the way Go's `%v` verb does: shortest round-trip digits,
/// switching to exponent form below 1e-4 and from 1e21 on.
#[must_use]
pub fn format_go_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };

    if (-4..21).contains(&exponent) {
        value.to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}
