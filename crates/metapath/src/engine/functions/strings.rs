use std::num::NonZeroUsize;
use std::sync::{LazyLock, Mutex, PoisonError};

use fancy_regex::{Expander, Regex, RegexBuilder};
use itertools::Itertools;
use lru::LruCache;
use unicode_normalization::UnicodeNormalization;

use super::common::{arg_or_context, count, integer, many, one, opt, opt_atomic, position_arg, string, string_arg};
use super::{CallContext, FunctionLibraryBuilder};
use crate::consts::NS_METAPATH_FUNCTIONS as FN;
use crate::engine::runtime::{Error, ErrorCode};
use crate::item::{AtomicValue, Sequence};
use crate::types::{AtomicType, ItemType, SequenceType};

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    use AtomicType::{Boolean, Double, Integer, String as Str};
    let opt_item = SequenceType::optional(ItemType::AnyItem);
    let any_atomic = opt(AtomicType::AnyAtomic);
    b.register_range(FN, "string", 0, Some(1), &[opt_item], one(Str), string_fn)
        .register_range(FN, "string-length", 0, Some(1), &[opt(Str)], one(Integer), string_length)
        .register_range(FN, "concat", 2, None, &[any_atomic], one(Str), concat)
        .register_range(FN, "string-join", 1, Some(2), &[many(AtomicType::AnyAtomic), one(Str)], one(Str), string_join)
        .register_range(FN, "substring", 2, Some(3), &[opt(Str), one(Double), one(Double)], one(Str), substring)
        .register(FN, "substring-before", &[opt(Str), opt(Str)], one(Str), substring_before)
        .register(FN, "substring-after", &[opt(Str), opt(Str)], one(Str), substring_after)
        .register(FN, "contains", &[opt(Str), opt(Str)], one(Boolean), contains)
        .register(FN, "starts-with", &[opt(Str), opt(Str)], one(Boolean), starts_with)
        .register(FN, "ends-with", &[opt(Str), opt(Str)], one(Boolean), ends_with)
        .register(FN, "upper-case", &[opt(Str)], one(Str), upper_case)
        .register(FN, "lower-case", &[opt(Str)], one(Str), lower_case)
        .register_range(FN, "normalize-space", 0, Some(1), &[opt(Str)], one(Str), normalize_space)
        .register_range(FN, "normalize-unicode", 1, Some(2), &[opt(Str), one(Str)], one(Str), normalize_unicode)
        .register(FN, "translate", &[opt(Str), one(Str), one(Str)], one(Str), translate)
        .register(FN, "compare", &[opt(Str), opt(Str)], opt(Integer), compare)
        .register_range(FN, "matches", 2, Some(3), &[opt(Str), one(Str), one(Str)], one(Boolean), matches)
        .register_range(FN, "replace", 3, Some(4), &[opt(Str), one(Str), one(Str), one(Str)], one(Str), replace)
        .register_range(FN, "tokenize", 1, Some(3), &[opt(Str), one(Str), one(Str)], many(Str), tokenize);
}

fn string_fn(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let value = arg_or_context(ctx, args, 0)?;
    match value.first_item(true)? {
        Some(item) => Ok(string(item.string_value()?)),
        None => Ok(string("")),
    }
}

fn string_length(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let text = match args.first() {
        Some(arg) => string_arg(arg),
        None => ctx.context_item()?.string_value()?,
    };
    Ok(count(text.chars().count()))
}

fn concat(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(string(args.iter().map(string_arg).collect::<String>()))
}

fn string_join(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let separator = args.get(1).map(string_arg).unwrap_or_default();
    let values = args[0].atomize()?;
    Ok(string(values.iter().map(AtomicValue::lexical).join(&separator)))
}

fn substring(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let text = string_arg(&args[0]);
    let start = opt_atomic(&args[1]).map_or(Ok(f64::NAN), position_arg)?;
    let end = match args.get(2) {
        Some(len) => start + opt_atomic(len).map_or(Ok(f64::NAN), position_arg)?,
        None => f64::INFINITY,
    };
    #[allow(clippy::cast_precision_loss)]
    let out: String = text
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let position = (*i + 1) as f64;
            position >= start && position < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(string(out))
}

fn substring_before(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let (text, needle) = (string_arg(&args[0]), string_arg(&args[1]));
    Ok(string(text.find(&needle).map(|i| &text[..i]).unwrap_or_default()))
}

fn substring_after(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let (text, needle) = (string_arg(&args[0]), string_arg(&args[1]));
    Ok(string(
        text.find(&needle)
            .map(|i| &text[i + needle.len()..])
            .unwrap_or_default(),
    ))
}

fn contains(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(super::common::boolean(string_arg(&args[0]).contains(&string_arg(&args[1]))))
}

fn starts_with(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(super::common::boolean(string_arg(&args[0]).starts_with(&string_arg(&args[1]))))
}

fn ends_with(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(super::common::boolean(string_arg(&args[0]).ends_with(&string_arg(&args[1]))))
}

fn upper_case(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(string(string_arg(&args[0]).to_uppercase()))
}

fn lower_case(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(string(string_arg(&args[0]).to_lowercase()))
}

fn normalize_space(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let text = match args.first() {
        Some(arg) => string_arg(arg),
        None => ctx.context_item()?.string_value()?,
    };
    Ok(string(text.split_whitespace().join(" ")))
}

fn normalize_unicode(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let text = string_arg(&args[0]);
    let form = args
        .get(1)
        .map_or_else(|| "NFC".to_string(), |f| string_arg(f).trim().to_uppercase());
    let normalized: String = match form.as_str() {
        "" => text,
        "NFC" => text.nfc().collect(),
        "NFD" => text.nfd().collect(),
        "NFKC" => text.nfkc().collect(),
        "NFKD" => text.nfkd().collect(),
        other => {
            return Err(Error::from_code(
                ErrorCode::FOCH0003,
                format!("unsupported normalization form '{other}'"),
            ));
        }
    };
    Ok(string(normalized))
}

fn translate(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let text = string_arg(&args[0]);
    let from: Vec<char> = string_arg(&args[1]).chars().collect();
    let to: Vec<char> = string_arg(&args[2]).chars().collect();
    let out: String = text
        .chars()
        .filter_map(|c| match from.iter().position(|f| *f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect();
    Ok(string(out))
}

fn compare(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let (Some(a), Some(b)) = (opt_atomic(&args[0]), opt_atomic(&args[1])) else {
        return Ok(Sequence::empty());
    };
    Ok(integer(match a.lexical().cmp(&b.lexical()) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }))
}

// ===== Regular expressions =====

static REGEX_CACHE: LazyLock<Mutex<LruCache<(String, String), Regex>>> =
    LazyLock::new(|| Mutex::new(LruCache::new(NonZeroUsize::MIN.saturating_add(63))));

/// Compiles `pattern` with XPath flags (`s m i x q`), memoising the result.
fn regex(pattern: &str, flags: &str) -> Result<Regex, Error> {
    let key = (pattern.to_string(), flags.to_string());
    if let Some(re) = REGEX_CACHE.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
        return Ok(re.clone());
    }
    let literal;
    let source = if flags.contains('q') {
        literal = fancy_regex::escape(pattern);
        literal.as_ref()
    } else {
        pattern
    };
    let mut builder = RegexBuilder::new(source);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.verbose_mode(true);
            }
            'q' => {}
            other => {
                return Err(Error::from_code(
                    ErrorCode::FORX0001,
                    format!("unsupported regular expression flag '{other}'"),
                ));
            }
        }
    }
    let re = builder.build()?;
    REGEX_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .put(key, re.clone());
    Ok(re)
}

fn flags(args: &[Sequence], index: usize) -> String {
    args.get(index).map(string_arg).unwrap_or_default()
}

fn matches(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let re = regex(&string_arg(&args[1]), &flags(args, 2))?;
    Ok(super::common::boolean(re.is_match(&string_arg(&args[0]))?))
}

fn replace(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let text = string_arg(&args[0]);
    let flags = flags(args, 3);
    let re = regex(&string_arg(&args[1]), &flags)?;
    if re.is_match("")? {
        return Err(Error::from_code(
            ErrorCode::FORX0002,
            "the pattern matches a zero-length string",
        ));
    }
    let replacement = string_arg(&args[2]);
    let expander = Expander::default();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for captures in re.captures_iter(&text) {
        let captures = captures?;
        let Some(m) = captures.get(0) else { continue };
        out.push_str(&text[last..m.start()]);
        if flags.contains('q') {
            out.push_str(&replacement);
        } else {
            expander.append_expansion(&mut out, &replacement, &captures);
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(string(out))
}

/// One-argument form splits on whitespace after trimming.
fn tokenize(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let text = string_arg(&args[0]);
    if args.len() == 1 {
        return Ok(Sequence::from_atomics(
            text.split_whitespace().map(AtomicValue::string),
        ));
    }
    if text.is_empty() {
        return Ok(Sequence::empty());
    }
    let re = regex(&string_arg(&args[1]), &flags(args, 2))?;
    if re.is_match("")? {
        return Err(Error::from_code(
            ErrorCode::FORX0002,
            "the pattern matches a zero-length string",
        ));
    }
    let mut tokens = Vec::new();
    for part in re.split(&text) {
        tokens.push(AtomicValue::string(part?));
    }
    Ok(Sequence::from_atomics(tokens))
}
