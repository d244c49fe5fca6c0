use crate::error::FormatError;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed action template.
///
/// `{name}` is a placeholder token; everything else is literal text. Token
/// names are trimmed, so `{ primary }` and `{primary}` are the same token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, FormatError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_owned()));
            }
            let after_open = &rest[open + 1..];
            let Some(close) = after_open.find('}') else {
                return Err(FormatError::UnterminatedToken {
                    offset: offset + open,
                });
            };
            let name = after_open[..close].trim();
            if name.is_empty() {
                return Err(FormatError::EmptyToken {
                    offset: offset + open,
                });
            }
            segments.push(Segment::Placeholder(name.to_owned()));

            let consumed = open + 1 + close + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_owned()));
        }

        Ok(Self { segments })
    }

    /// Placeholder tokens in order of appearance (repeats included).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_placeholders(&self) -> bool {
        self.placeholders().next().is_some()
    }

    /// Substitutes every token with the text returned by `lookup`.
    pub fn render<'a, F>(&self, lookup: F) -> Result<String, FormatError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = lookup(name).ok_or_else(|| FormatError::UnboundPlaceholder {
                        placeholder: name.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
