use std::fmt;

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationListParser, DeclarationParser, ParseError, Parser,
    ParserInput,
};

/// One `property: value` entry of a style attribute. The property name is
/// lower-cased; the value is kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssDeclaration {
    pub property: String,
    pub value: String,
}

struct CssDeclarationParser;

impl<'i> DeclarationParser<'i> for CssDeclarationParser {
    type Declaration = CssDeclaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Declaration, ParseError<'i, ()>> {
        let start = input.position();
        while input.next().is_ok() {}
        let value = input.slice_from(start).trim();
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }

        Ok(CssDeclaration {
            property: name.to_ascii_lowercase(),
            value: value.to_string(),
        })
    }
}

// Style attributes can't hold at-rules; the default implementations reject them.
impl<'i> AtRuleParser<'i> for CssDeclarationParser {
    type PreludeBlock = ();
    type PreludeNoBlock = ();
    type AtRule = CssDeclaration;
    type Error = ();
}

/// Parses the value of a `style` attribute into its declarations, in source
/// order. Anything that isn't a well-formed declaration is dropped.
pub fn parse_css_style_attribute(css: &str) -> Vec<CssDeclaration> {
    let mut parser_input = ParserInput::new(css);
    let mut parser = Parser::new(&mut parser_input);

    let mut declarations = Vec::new();
    for declaration in DeclarationListParser::new(&mut parser, CssDeclarationParser) {
        match declaration {
            Ok(declaration) => declarations.push(declaration),
            Err((error, source)) => {
                trace!("CSS declaration dropped: {:?}, {:?}", error.kind, source);
            }
        }
    }

    declarations
}

pub fn serialize_css_declarations(declarations: &[CssDeclaration]) -> String {
    declarations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for CssDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {};", self.property, self.value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_declarations_in_order() {
        let declarations = parse_css_style_attribute("color: red; font-size: 12px");
        assert_eq!(
            declarations,
            vec![
                CssDeclaration {
                    property: "color".to_string(),
                    value: "red".to_string(),
                },
                CssDeclaration {
                    property: "font-size".to_string(),
                    value: "12px".to_string(),
                },
            ]
        );
    }

    #[test]
    fn drops_malformed_declarations() {
        let declarations = parse_css_style_attribute("color: red; expression(alert(1)); width:");
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].property, "color");
    }

    #[test]
    fn lower_cases_property_names() {
        let declarations = parse_css_style_attribute("Background-Color: #FFF");
        assert_eq!(declarations[0].property, "background-color");
        assert_eq!(declarations[0].value, "#FFF");
    }

    #[test]
    fn keeps_function_values_whole() {
        let declarations = parse_css_style_attribute("color: rgb(1, 2, 3) !important");
        assert_eq!(declarations[0].value, "rgb(1, 2, 3) !important");
    }

    #[test]
    fn serializes_with_spaces() {
        let declarations = parse_css_style_attribute("color:red;font-size:12px;");
        assert_eq!(
            serialize_css_declarations(&declarations),
            "color: red; font-size: 12px;"
        );
    }
}
