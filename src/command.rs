//! Commands as staged by clients and pipelines.
//!
//! A [`Command`] is an ordered list of binary-safe tokens plus the name used
//! to look up its reply decoder, and the [`CommandOptions`] that decoder
//! needs (`WITHSCORES`, score casting, `SORT … GET` grouping, …).

use bytes::Bytes;

/// How scores in a sorted-set reply are converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreCast {
    /// Parse as a float (the default).
    #[default]
    Float,
    /// Parse as an integer; fractional scores are truncated.
    Int,
    /// Keep the raw bytes the server sent.
    Raw,
}

/// Decoder hints that travel with a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOptions {
    /// The reply interleaves members and scores.
    pub withscores: bool,
    /// How to convert scores when `withscores` is set (and for ZSCAN).
    pub score_cast: ScoreCast,
    /// `SORT` with several `GET` patterns: group the flat reply into tuples.
    pub groups: Option<usize>,
    /// `OBJECT` subcommand, which decides the reply shape.
    pub infotype: Option<String>,
}

/// Anything that can be sent as a single command argument.
pub trait ToArg {
    fn to_arg(&self) -> Bytes;
}

impl ToArg for str {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for [u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Bytes {
        (**self).to_arg()
    }
}

macro_rules! int_to_arg {
    ($($t:ty),*) => {$(
        impl ToArg for $t {
            fn to_arg(&self) -> Bytes {
                Bytes::copy_from_slice(itoa::Buffer::new().format(*self).as_bytes())
            }
        }
    )*};
}

int_to_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ToArg for f64 {
    fn to_arg(&self) -> Bytes {
        let s = if self.is_infinite() {
            if *self > 0.0 { "+inf".to_string() } else { "-inf".to_string() }
        } else {
            self.to_string()
        };
        Bytes::from(s)
    }
}

impl ToArg for f32 {
    fn to_arg(&self) -> Bytes {
        f64::from(*self).to_arg()
    }
}

/// One Redis command: its lookup name, wire tokens and decoder options.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
    options: CommandOptions,
}

impl Command {
    /// Start a command. Multi-word names such as `"CONFIG GET"` are split
    /// into separate tokens but kept whole as the decoder lookup name.
    pub fn new(name: &str) -> Self {
        let args = name
            .split_whitespace()
            .map(|token| Bytes::copy_from_slice(token.as_bytes()))
            .collect();
        Self {
            name: name.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase(),
            args,
            options: CommandOptions::default(),
        }
    }

    /// Append one argument.
    pub fn arg<A: ToArg>(mut self, arg: A) -> Self {
        self.args.push(arg.to_arg());
        self
    }

    /// Append every argument from `args`.
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.args.extend(args.into_iter().map(|a| a.to_arg()));
        self
    }

    /// Append `arg` only when `cond` holds (for optional flags).
    pub fn arg_if<A: ToArg>(self, cond: bool, arg: A) -> Self {
        if cond {
            self.arg(arg)
        } else {
            self
        }
    }

    /// Attach decoder options.
    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    /// The decoder lookup name (upper-cased, e.g. `"SCRIPT LOAD"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All wire tokens, name included.
    pub fn tokens(&self) -> &[Bytes] {
        &self.args
    }

    pub fn options(&self) -> &CommandOptions {
        &self.options
    }

    /// Tokens joined by spaces, lossily decoded, for error messages.
    pub fn display_args(&self) -> String {
        self.args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ── Tests ──────────────────────────────────────────────────────────
