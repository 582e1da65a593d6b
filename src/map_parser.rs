//! Tokenized view of ISL set and map strings.
//!
//! Iteration spaces, schedules and accesses enter the system as strings in
//! the solver's textual format. This module is the narrow adapter that
//! takes those strings apart and puts them back together: it splits a
//! relation into its tuple names, dimension lists and constraint list
//! without interpreting the affine arithmetic, which stays the solver's
//! business. The schedule algebra uses these tokens to derive identity
//! schedules and to assemble transformation maps that are then re-parsed
//! through the solver.

use crate::error::{Error, Result};
use crate::expr::{BinOp, Expr};

/// The dimension list of one tuple, e.g. `i, j` in `S0[i, j]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpaceTokens {
    pub dims: Vec<String>,
}

impl SpaceTokens {
    pub fn parse(text: &str) -> SpaceTokens {
        let dims = text
            .split(',')
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty())
            .collect();
        SpaceTokens { dims }
    }

    pub fn to_str(&self) -> String {
        self.dims.join(", ")
    }

    /// Replaces a dimension with two new dimensions, preserving order.
    pub fn replace(&mut self, from: &str, out0: &str, out1: &str) {
        let mut dims = Vec::with_capacity(self.dims.len() + 1);
        for dim in &self.dims {
            if dim == from {
                dims.push(out0.to_owned());
                dims.push(out1.to_owned());
            } else {
                dims.push(dim.clone());
            }
        }
        self.dims = dims;
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }
}

/// The conjunction of constraints after the `:` of a relation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstraintTokens {
    pub constraints: Vec<String>,
}

impl ConstraintTokens {
    pub fn parse(text: &str) -> ConstraintTokens {
        let constraints = text
            .split(" and ")
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .collect();
        ConstraintTokens { constraints }
    }

    pub fn add(&mut self, constraint: &str) {
        self.constraints.push(constraint.trim().to_owned());
    }

    pub fn to_str(&self) -> String {
        self.constraints.join(" and ")
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Parsed tokens of a set string `[params] -> { name[dims] : constraints }`.
#[derive(Clone, Debug, PartialEq)]
pub struct SetTokens {
    pub params: SpaceTokens,
    pub name: String,
    pub space: SpaceTokens,
    pub constraints: ConstraintTokens,
}

impl SetTokens {
    pub fn parse(text: &str) -> Result<SetTokens> {
        let (params, body) = split_params(text)?;
        let (name, space, rest) = parse_tuple(body)?;
        let constraints = parse_constraints(rest);
        Ok(SetTokens {
            params,
            name,
            space,
            constraints,
        })
    }

    pub fn to_str(&self) -> String {
        let mut out = String::new();
        if !self.params.is_empty() {
            out.push_str(&format!("[{}] -> ", self.params.to_str()));
        }
        out.push_str(&format!("{{ {}[{}]", self.name, self.space.to_str()));
        if !self.constraints.is_empty() {
            out.push_str(&format!(" : {}", self.constraints.to_str()));
        }
        out.push_str(" }");
        out
    }

    /// The identity map over this set's space, as a map string. The domain
    /// and range tuples carry the set's own name, so parsing the result
    /// yields a schedule whose both tuple names equal the computation name.
    pub fn identity_map_str(&self) -> String {
        let mut out = String::new();
        if !self.params.is_empty() {
            out.push_str(&format!("[{}] -> ", self.params.to_str()));
        }
        out.push_str(&format!(
            "{{ {}[{}] -> {}[{}]",
            self.name,
            self.space.to_str(),
            self.name,
            self.space.to_str()
        ));
        if !self.constraints.is_empty() {
            out.push_str(&format!(" : {}", self.constraints.to_str()));
        }
        out.push_str(" }");
        out
    }
}

/// Parsed tokens of a map string
/// `[params] -> { dname[ddims] -> rname[rdims] : constraints }`.
#[derive(Clone, Debug, PartialEq)]
pub struct MapTokens {
    pub params: SpaceTokens,
    pub domain_name: String,
    pub range_name: String,
    pub domain: SpaceTokens,
    pub range: SpaceTokens,
    pub constraints: ConstraintTokens,
}

impl MapTokens {
    pub fn parse(text: &str) -> Result<MapTokens> {
        let (params, body) = split_params(text)?;
        let (domain_name, domain, rest) = parse_tuple(body)?;
        let rest = rest.trim_start();
        let rest = rest
            .strip_prefix("->")
            .ok_or_else(|| Error::Parse(format!("expected `->` in map string `{}`", text)))?;
        let (range_name, range, rest) = parse_tuple(rest)?;
        let constraints = parse_constraints(rest);
        Ok(MapTokens {
            params,
            domain_name,
            range_name,
            domain,
            range,
            constraints,
        })
    }

    pub fn to_str(&self) -> String {
        let mut out = String::new();
        if !self.params.is_empty() {
            out.push_str(&format!("[{}] -> ", self.params.to_str()));
        }
        out.push_str(&format!(
            "{{ {}[{}] -> {}[{}]",
            self.domain_name,
            self.domain.to_str(),
            self.range_name,
            self.range.to_str()
        ));
        if !self.constraints.is_empty() {
            out.push_str(&format!(" : {}", self.constraints.to_str()));
        }
        out.push_str(" }");
        out
    }
}

/// Splits an optional parameter prefix `[N, M] -> ` from the `{ ... }` body.
fn split_params(text: &str) -> Result<(SpaceTokens, &str)> {
    let brace = text
        .find('{')
        .ok_or_else(|| Error::Parse(format!("missing `{{` in `{}`", text)))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| Error::Parse(format!("missing `}}` in `{}`", text)))?;
    if end <= brace {
        return Err(Error::Parse(format!("unbalanced braces in `{}`", text)));
    }
    let prefix = &text[..brace];
    let params = match (prefix.find('['), prefix.find(']')) {
        (Some(open), Some(close)) if close > open => {
            SpaceTokens::parse(&prefix[open + 1..close])
        }
        _ => SpaceTokens::default(),
    };
    Ok((params, text[brace + 1..end].trim()))
}

/// Reads one `name[dims]` tuple off the front of `text`, returning the
/// tuple name, its dimensions and the remaining text.
fn parse_tuple(text: &str) -> Result<(String, SpaceTokens, &str)> {
    let text = text.trim_start();
    let open = text
        .find('[')
        .ok_or_else(|| Error::Parse(format!("missing `[` in tuple `{}`", text)))?;
    let close = text[open..]
        .find(']')
        .map(|i| i + open)
        .ok_or_else(|| Error::Parse(format!("missing `]` in tuple `{}`", text)))?;
    let name = text[..open].trim().to_owned();
    let space = SpaceTokens::parse(&text[open + 1..close]);
    Ok((name, space, &text[close + 1..]))
}

fn parse_constraints(rest: &str) -> ConstraintTokens {
    match rest.find(':') {
        Some(colon) => ConstraintTokens::parse(&rest[colon + 1..]),
        None => ConstraintTokens::default(),
    }
}

// ============================================================================
// Affine expression tokens
// ============================================================================

/// Parses one range token of an access relation (`i`, `k - 1`, `2*i + j`)
/// into a symbolic expression over the relation's domain dimensions.
///
/// The grammar is the additive/multiplicative fragment the solver prints
/// for affine map ranges; anything richer is rejected as a parse error.
pub fn parse_affine(text: &str) -> Result<Expr> {
    let mut parser = AffineParser {
        text: text.as_bytes(),
        pos: 0,
    };
    let expr = parser.parse_sum()?;
    parser.skip_ws();
    if parser.pos != parser.text.len() {
        return Err(Error::Parse(format!(
            "trailing input in affine expression `{}`",
            text
        )));
    }
    Ok(expr)
}

struct AffineParser<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> AffineParser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.text.get(self.pos).copied()
    }

    fn parse_sum(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_product()?;
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    let rhs = self.parse_product()?;
                    lhs = Expr::binary(BinOp::Add, lhs, rhs);
                }
                Some(b'-') => {
                    self.pos += 1;
                    let rhs = self.parse_product()?;
                    lhs = Expr::binary(BinOp::Sub, lhs, rhs);
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_product(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_atom()?;
        while self.peek() == Some(b'*') {
            self.pos += 1;
            let rhs = self.parse_atom()?;
            lhs = Expr::binary(BinOp::Mul, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.parse_sum()?;
                if self.peek() != Some(b')') {
                    return Err(Error::Parse("unbalanced parenthesis".to_owned()));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(b'-') => {
                self.pos += 1;
                Ok(Expr::neg(self.parse_atom()?).fold())
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self
                    .text
                    .get(self.pos)
                    .map_or(false, |c| c.is_ascii_digit())
                {
                    self.pos += 1;
                }
                let digits = std::str::from_utf8(&self.text[start..self.pos])
                    .map_err(|_| Error::Parse("non-utf8 affine token".to_owned()))?;
                let value: i32 = digits
                    .parse()
                    .map_err(|_| Error::Parse(format!("integer out of range: `{}`", digits)))?;
                Ok(Expr::int32(value))
            }
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                let start = self.pos;
                while self
                    .text
                    .get(self.pos)
                    .map_or(false, |c| c.is_ascii_alphanumeric() || *c == b'_' || *c == b'\'')
                {
                    self.pos += 1;
                }
                let name = std::str::from_utf8(&self.text[start..self.pos])
                    .map_err(|_| Error::Parse("non-utf8 affine token".to_owned()))?;
                Ok(Expr::iter(name))
            }
            other => Err(Error::Parse(format!(
                "unexpected token {:?} in affine expression",
                other.map(|c| c as char)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_tokens_round_trip() {
        let tokens =
            SetTokens::parse("{ S0[i, j] : 0 <= i <= 1000 and 0 <= j <= 1000 }").unwrap();
        assert_eq!(tokens.name, "S0");
        assert_eq!(tokens.space.dims, vec!["i", "j"]);
        assert_eq!(tokens.constraints.constraints.len(), 2);
        assert_eq!(
            tokens.to_str(),
            "{ S0[i, j] : 0 <= i <= 1000 and 0 <= j <= 1000 }"
        );
    }

    #[test]
    fn set_tokens_with_params() {
        let tokens = SetTokens::parse("[N, M] -> { S[i, j] : 0 <= i < N and 0 <= j < M }")
            .unwrap();
        assert_eq!(tokens.params.dims, vec!["N", "M"]);
        assert_eq!(
            tokens.identity_map_str(),
            "[N, M] -> { S[i, j] -> S[i, j] : 0 <= i < N and 0 <= j < M }"
        );
    }

    #[test]
    fn map_tokens_round_trip() {
        let tokens = MapTokens::parse("{ S0[i, j] -> buf0[i, j] }").unwrap();
        assert_eq!(tokens.domain_name, "S0");
        assert_eq!(tokens.range_name, "buf0");
        assert!(tokens.constraints.is_empty());
        assert_eq!(tokens.to_str(), "{ S0[i, j] -> buf0[i, j] }");
    }

    #[test]
    fn space_replace_splits_a_dimension() {
        let mut space = SpaceTokens::parse("i, j, k");
        space.replace("j", "j0", "j1");
        assert_eq!(space.dims, vec!["i", "j0", "j1", "k"]);
    }

    #[test]
    fn affine_parser_handles_access_ranges() {
        assert_eq!(parse_affine("i").unwrap(), Expr::iter("i"));
        assert_eq!(
            parse_affine("k - 1").unwrap(),
            Expr::sub(Expr::iter("k"), Expr::int32(1))
        );
        assert_eq!(
            parse_affine("2*i + j").unwrap(),
            Expr::add(Expr::mul(Expr::int32(2), Expr::iter("i")), Expr::iter("j"))
        );
        assert!(parse_affine("i / j").is_err());
    }
}
