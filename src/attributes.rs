use html5ever::LocalName;

use crate::arena_dom::ElementView;
use crate::css_parser::{parse_css_style_attribute, serialize_css_declarations};
use crate::policy::Policy;
use crate::tree::Element;

/// Copies the attributes of `source` that `policy` allows for `tag` onto
/// `target`, in source order.
///
/// `tag` is the tag the element was written with, which differs from
/// `target.name` for content tags. Styles keep only allowed properties, and
/// URI attributes whose scheme isn't allowed are dropped; the element itself
/// is always kept.
pub fn copy_allowed_attributes(
    policy: &Policy,
    tag: &LocalName,
    source: &ElementView<'_>,
    target: &mut Element,
) {
    for attr in source.attributes() {
        let name = if attr.name.local.bytes().any(|b| b.is_ascii_uppercase()) {
            LocalName::from(attr.name.local.to_ascii_lowercase())
        } else {
            attr.name.local.clone()
        };

        if !policy.allows_attribute(tag, &name) {
            trace!("dropping attribute {} on <{}>", name, tag);
            continue;
        }

        if name == local_name!("style") {
            let declarations: Vec<_> = parse_css_style_attribute(&attr.value)
                .into_iter()
                .filter(|declaration| {
                    let allowed = policy.allows_css_property(&declaration.property);
                    if !allowed {
                        trace!("dropping CSS property {} on <{}>", declaration.property, tag);
                    }
                    allowed
                })
                .collect();
            if !declarations.is_empty() {
                target.set_attr(name, serialize_css_declarations(&declarations));
            }
            continue;
        }

        if policy.is_uri_attribute(&name) && !policy.allows_uri(&attr.value) {
            trace!("dropping {}={:?} on <{}>: scheme not allowed", name, &attr.value[..], tag);
            continue;
        }

        target.set_attr(name, &attr.value[..]);
    }
}
