//! RFC 1035 master-file parsing.

use crate::store::Zone;
use crate::{Result, ZoneError};
use arx_proto::{Name, RData, RecordClass, RecordType, ResourceRecord, Type};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const MAX_INCLUDE_DEPTH: usize = 8;

/// Parses master-file text into a zone.
///
/// `expected_serial` is the serial-unchanged sentinel: when the first
/// SOA carries exactly this serial, parsing stops with
/// [`ZoneError::SerialUnchanged`] so callers can skip reinstalling a
/// zone that has not moved.
pub fn parse_zone(text: &str, origin: &Name, expected_serial: Option<u32>) -> Result<Zone> {
    Parser::new(origin.clone())
        .expected_serial(expected_serial)
        .parse_str(text)
}

/// Master-file parser state and options.
///
/// Handles `$ORIGIN`, `$TTL`, and `$INCLUDE` directives, `@`, relative
/// names, parenthesized multi-line records, and `;` comments. The
/// first record of a zone must be its SOA.
#[derive(Debug)]
pub struct Parser {
    origin: Name,
    current_origin: Name,
    default_ttl: u32,
    expected_serial: Option<u32>,
    include_base: Option<PathBuf>,
    last_owner: Option<Name>,
    file: String,
    line: usize,
}

impl Parser {
    /// Creates a parser for a zone rooted at `origin`.
    pub fn new(origin: Name) -> Self {
        Self {
            current_origin: origin.clone(),
            origin,
            default_ttl: 3600,
            expected_serial: None,
            include_base: None,
            last_owner: None,
            file: "inline".to_string(),
            line: 0,
        }
    }

    /// Sets the serial-unchanged sentinel.
    pub fn expected_serial(mut self, serial: Option<u32>) -> Self {
        self.expected_serial = serial;
        self
    }

    /// Enables `$INCLUDE`, resolving relative paths against `base`.
    pub fn include_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.include_base = Some(base.into());
        self
    }

    /// Parses a zone file from disk.
    pub fn parse_file(mut self, path: impl AsRef<Path>) -> Result<Zone> {
        let path = path.as_ref();
        self.file = path.display().to_string();
        if self.include_base.is_none() {
            self.include_base = path.parent().map(Path::to_path_buf);
        }
        let text = std::fs::read_to_string(path)?;
        self.parse_str(&text)
    }

    /// Parses a zone from text.
    pub fn parse_str(mut self, text: &str) -> Result<Zone> {
        let mut zone = Zone::new(self.origin.clone());
        let mut seen_soa = false;
        self.parse_into(text, &mut zone, &mut seen_soa, 0)?;
        if !seen_soa {
            return Err(ZoneError::NoSoa(self.origin.clone()));
        }
        Ok(zone)
    }

    fn parse_into(
        &mut self,
        text: &str,
        zone: &mut Zone,
        seen_soa: &mut bool,
        depth: usize,
    ) -> Result<()> {
        let mut pending = String::new();
        let mut depth_parens = 0usize;

        for raw_line in text.lines() {
            self.line += 1;
            let line = strip_comment(raw_line);
            if line.trim().is_empty() && depth_parens == 0 {
                continue;
            }

            depth_parens += line.matches('(').count();
            let closes = line.matches(')').count();
            if closes > depth_parens {
                return Err(self.error("unbalanced parentheses"));
            }
            depth_parens -= closes;

            if !pending.is_empty() {
                pending.push(' ');
            }
            pending.push_str(line);

            if depth_parens > 0 {
                continue;
            }

            let entry = pending.replace(['(', ')'], " ");
            pending.clear();
            self.parse_entry(&entry, zone, seen_soa, depth)?;
        }

        if depth_parens > 0 {
            return Err(self.error("unterminated parentheses at end of input"));
        }
        Ok(())
    }

    fn parse_entry(
        &mut self,
        entry: &str,
        zone: &mut Zone,
        seen_soa: &mut bool,
        depth: usize,
    ) -> Result<()> {
        // An indented entry inherits the previous owner, so only trim
        // the end before tokenizing.
        let starts_blank = entry.starts_with(' ') || entry.starts_with('\t');
        let tokens: Vec<&str> = entry.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(());
        }

        if tokens[0].starts_with('$') {
            return self.parse_directive(&tokens, zone, seen_soa, depth);
        }

        let (owner, rest) = if starts_blank {
            let owner = self
                .last_owner
                .clone()
                .unwrap_or_else(|| self.current_origin.clone());
            (owner, &tokens[..])
        } else {
            (self.make_absolute(tokens[0])?, &tokens[1..])
        };

        let (ttl, rest) = self.take_ttl(rest);
        let (_, rest) = take_class(rest);
        // TTL may also follow the class.
        let (ttl, rest) = match ttl {
            Some(ttl) => (Some(ttl), rest),
            None => self.take_ttl(rest),
        };
        let ttl = ttl.unwrap_or(self.default_ttl);

        let Some((type_token, rdata_tokens)) = rest.split_first() else {
            return Err(self.error("missing record type"));
        };
        let rtype = RecordType::from_str(type_token)
            .map_err(|()| self.error(format!("unknown record type {type_token:?}")))?;

        let rdata = self.parse_rdata(rtype, rdata_tokens)?;
        let record = ResourceRecord::new(
            owner.clone(),
            Type::Known(rtype),
            RecordClass::IN.into(),
            ttl,
            rdata,
        );

        if !*seen_soa {
            let RData::Soa(soa) = record.rdata() else {
                return Err(self.error("first record in zone must be the SOA"));
            };
            if let Some(expected) = self.expected_serial {
                if soa.serial == expected {
                    return Err(ZoneError::SerialUnchanged {
                        origin: self.origin.clone(),
                        serial: expected,
                    });
                }
            }
            *seen_soa = true;
        }

        zone.insert(record)
            .map_err(|e| self.error(e.to_string()))?;
        self.last_owner = Some(owner);
        Ok(())
    }

    fn parse_directive(
        &mut self,
        tokens: &[&str],
        zone: &mut Zone,
        seen_soa: &mut bool,
        depth: usize,
    ) -> Result<()> {
        match tokens[0].to_ascii_uppercase().as_str() {
            "$ORIGIN" => {
                let name = tokens
                    .get(1)
                    .ok_or_else(|| self.error("$ORIGIN needs a name"))?;
                self.current_origin = self.make_absolute(name)?;
                Ok(())
            }
            "$TTL" => {
                let value = tokens
                    .get(1)
                    .ok_or_else(|| self.error("$TTL needs a value"))?;
                self.default_ttl = parse_ttl_value(value)
                    .ok_or_else(|| self.error(format!("bad TTL {value:?}")))?;
                Ok(())
            }
            "$INCLUDE" => {
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(self.error("$INCLUDE nesting too deep"));
                }
                let base = self
                    .include_base
                    .clone()
                    .ok_or_else(|| self.error("$INCLUDE not available for inline zones"))?;
                let target = tokens
                    .get(1)
                    .ok_or_else(|| self.error("$INCLUDE needs a path"))?;
                let path = base.join(target);
                // The include's origin override is scoped to the
                // included file.
                let saved_origin = self.current_origin.clone();
                if let Some(origin) = tokens.get(2) {
                    self.current_origin = self.make_absolute(origin)?;
                }
                let text = std::fs::read_to_string(&path)?;
                let saved_file = std::mem::replace(&mut self.file, path.display().to_string());
                let saved_line = std::mem::take(&mut self.line);
                self.parse_into(&text, zone, seen_soa, depth + 1)?;
                self.file = saved_file;
                self.line = saved_line;
                self.current_origin = saved_origin;
                Ok(())
            }
            other => Err(self.error(format!("unknown directive {other:?}"))),
        }
    }

    fn parse_rdata(&self, rtype: RecordType, tokens: &[&str]) -> Result<RData> {
        // Names inside rdata may be relative; qualify them before
        // handing off to the presentation parsers.
        let mut owned: Vec<String> = tokens.iter().map(|t| (*t).to_string()).collect();
        let name_fields: &[usize] = match rtype {
            RecordType::NS | RecordType::CNAME => &[0],
            RecordType::SOA => &[0, 1],
            RecordType::SRV => &[3],
            _ => &[],
        };
        for &i in name_fields {
            if let Some(token) = owned.get_mut(i) {
                *token = self.make_absolute(token)?.to_string();
            }
        }
        let borrowed: Vec<&str> = owned.iter().map(String::as_str).collect();
        RData::parse_presentation(rtype, &borrowed).map_err(|e| self.error(e.to_string()))
    }

    fn take_ttl<'t>(&self, tokens: &'t [&'t str]) -> (Option<u32>, &'t [&'t str]) {
        match tokens.first() {
            Some(first)
                if first
                    .chars()
                    .next()
                    .map(|c| c.is_ascii_digit())
                    .unwrap_or(false) =>
            {
                match parse_ttl_value(first) {
                    Some(ttl) => (Some(ttl), &tokens[1..]),
                    None => (None, tokens),
                }
            }
            _ => (None, tokens),
        }
    }

    fn make_absolute(&self, token: &str) -> Result<Name> {
        if token == "@" {
            return Ok(self.current_origin.clone());
        }
        if token.ends_with('.') && !token.ends_with("\\.") {
            return Name::from_str(token).map_err(|e| self.error(e.to_string()));
        }
        let origin = self.current_origin.to_string();
        let qualified = if origin == "." {
            format!("{token}.")
        } else {
            format!("{token}.{origin}")
        };
        Name::from_str(&qualified).map_err(|e| self.error(e.to_string()))
    }

    fn error(&self, message: impl Into<String>) -> ZoneError {
        ZoneError::Parse {
            file: self.file.clone(),
            line: self.line,
            message: message.into(),
        }
    }
}

fn strip_comment(line: &str) -> &str {
    // Quotes protect semicolons inside TXT strings.
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn take_class<'t>(tokens: &'t [&'t str]) -> (Option<RecordClass>, &'t [&'t str]) {
    match tokens.first().map(|t| t.to_ascii_uppercase()) {
        Some(c) if c == "IN" => (Some(RecordClass::IN), &tokens[1..]),
        Some(c) if c == "CH" => (Some(RecordClass::CH), &tokens[1..]),
        Some(c) if c == "HS" => (Some(RecordClass::HS), &tokens[1..]),
        _ => (None, tokens),
    }
}

/// Parses a TTL value with optional s/m/h/d/w suffixes (`1h30m`).
fn parse_ttl_value(s: &str) -> Option<u32> {
    let mut total: u32 = 0;
    let mut current: u32 = 0;
    let mut any_digit = false;
    for c in s.chars() {
        match c {
            '0'..='9' => {
                any_digit = true;
                current = current.checked_mul(10)?.checked_add(c.to_digit(10)?)?;
            }
            's' | 'S' => {
                total = total.checked_add(current)?;
                current = 0;
            }
            'm' | 'M' => {
                total = total.checked_add(current.checked_mul(60)?)?;
                current = 0;
            }
            'h' | 'H' => {
                total = total.checked_add(current.checked_mul(3600)?)?;
                current = 0;
            }
            'd' | 'D' => {
                total = total.checked_add(current.checked_mul(86400)?)?;
                current = 0;
            }
            'w' | 'W' => {
                total = total.checked_add(current.checked_mul(604_800)?)?;
                current = 0;
            }
            _ => return None,
        }
    }
    if !any_digit {
        return None;
    }
    total.checked_add(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LookupResult;

    const EXAMPLE_ORG: &str = r#"
$TTL 3600
$ORIGIN example.org.
@   IN  SOA ns.dns.example.org. hostmaster.example.org. (
            1595557027 ; serial
            7200       ; refresh
            1800       ; retry
            86400      ; expire
            30         ; minttl
        )
@       IN  NS  ns1.example.org.
mail    IN  A   192.0.2.5
www     IN  CNAME mail
@       IN  TXT "hello world"
"#;

    fn origin() -> Name {
        Name::from_str("example.org.").unwrap()
    }

    #[test]
    fn parses_example_zone() {
        let zone = parse_zone(EXAMPLE_ORG, &origin(), None).unwrap();
        assert_eq!(zone.serial(), Some(1595557027));
        assert_eq!(zone.record_count(), 5);

        let out = zone.lookup(&Name::from_str("mail.example.org.").unwrap(), RecordType::A);
        assert_eq!(out.result, LookupResult::Success);

        // Relative CNAME target was qualified.
        let www = zone.lookup(&Name::from_str("www.example.org.").unwrap(), RecordType::A);
        assert_eq!(www.answer.len(), 2);
    }

    #[test]
    fn serial_sentinel() {
        let err = parse_zone(EXAMPLE_ORG, &origin(), Some(1595557027)).unwrap_err();
        assert!(matches!(
            err,
            ZoneError::SerialUnchanged { serial: 1595557027, .. }
        ));
        // A different expectation parses normally.
        assert!(parse_zone(EXAMPLE_ORG, &origin(), Some(1)).is_ok());
    }

    #[test]
    fn missing_soa_is_fatal() {
        let err = parse_zone("\n; empty\n", &origin(), None).unwrap_err();
        assert!(matches!(err, ZoneError::NoSoa(_)));
    }

    #[test]
    fn first_record_must_be_soa() {
        let text = "@ 3600 IN A 192.0.2.1\n";
        let err = parse_zone(text, &origin(), None).unwrap_err();
        assert!(matches!(err, ZoneError::Parse { .. }));
    }

    #[test]
    fn bare_owner_inherits_previous() {
        let text = r#"
@ 3600 IN SOA ns.dns.example.org. hostmaster.example.org. 7 7200 1800 86400 30
@ IN NS ns1.example.org.
host IN A 192.0.2.1
     IN A 192.0.2.2
"#;
        let zone = parse_zone(text, &origin(), None).unwrap();
        let out = zone.lookup(&Name::from_str("host.example.org.").unwrap(), RecordType::A);
        assert_eq!(out.answer.len(), 2);
    }

    #[test]
    fn ttl_suffixes() {
        assert_eq!(parse_ttl_value("3600"), Some(3600));
        assert_eq!(parse_ttl_value("1h30m"), Some(5400));
        assert_eq!(parse_ttl_value("2d"), Some(172_800));
        assert_eq!(parse_ttl_value("x"), None);
    }

    #[test]
    fn quoted_semicolon_survives() {
        let text = r#"
@ 3600 IN SOA ns.dns.example.org. hostmaster.example.org. 7 7200 1800 86400 30
@ IN NS ns1.example.org.
note IN TXT "keep; this"
"#;
        let zone = parse_zone(text, &origin(), None).unwrap();
        let out = zone.lookup(&Name::from_str("note.example.org.").unwrap(), RecordType::TXT);
        assert_eq!(out.answer.len(), 1);
    }
}
