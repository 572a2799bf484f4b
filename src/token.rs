use num_bigint::BigInt;

use crate::intern::Symbol;

/// Token kinds. One variant per keyword and per multi-character operator,
/// plus the single-character operators and the literal/meta kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// No token scanned yet.
    Nothing,

    // single-character operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Tilde,
    Hash,
    Amp,
    Or,
    Lparen,
    Rparen,
    Lbracket,
    Rbracket,
    Lbrace,
    Rbrace,
    Comma,
    Semi,
    Colon,
    Dot,
    Eq,
    Lt,
    Gt,
    Query,
    Bang,

    // multi-character operators
    Assign,   // :=
    Arrow,    // ->
    Dots,     // ..
    Loop,     // *[
    Rep,      // <<
    RepEnd,   // >>
    Arb,      // []
    Mutex,    // [:]
    Concat,   // ++
    Neq,      // !=
    Lte,      // <=
    Gte,      // >=
    Peek,     // #?
    Varargs,  // ...

    // keywords
    KwAfter,
    KwAll,
    KwArray,
    KwAtomic,
    KwBool,
    KwBuiltin,
    KwChp,
    KwConnect,
    KwConst,
    KwCounter,
    KwDefault,
    KwDelay,
    KwExport,
    KwFalse,
    KwField,
    KwFunction,
    KwHse,
    KwInstance,
    KwInt,
    KwMeta,
    KwMod,
    KwOf,
    KwPrs,
    KwProcedure,
    KwProcess,
    KwProperty,
    KwRecord,
    KwRequires,
    KwRes,
    KwSkip,
    KwSymbol,
    KwType,
    KwTrue,
    KwUnion,
    KwVal,
    KwValres,
    KwVar,
    KwVolatile,
    KwXor,

    // literals and special tokens
    Id,
    IntConst,
    BigConst,
    CharConst,
    StringConst,
    SymbolConst,
    FloatConst,
    Eof,
    Newline,
    Instance,
}

/// Multi-character operators in scan order. Entries whose text is a prefix
/// of another entry come after the longer one.
pub const OPERATORS: &[(&str, TokenKind)] = &[
    (":=", TokenKind::Assign),
    ("->", TokenKind::Arrow),
    ("...", TokenKind::Varargs),
    ("..", TokenKind::Dots),
    ("*[", TokenKind::Loop),
    ("<<", TokenKind::Rep),
    (">>", TokenKind::RepEnd),
    ("[]", TokenKind::Arb),
    ("[:]", TokenKind::Mutex),
    ("++", TokenKind::Concat),
    ("!=", TokenKind::Neq),
    ("<=", TokenKind::Lte),
    (">=", TokenKind::Gte),
    ("#?", TokenKind::Peek),
    // rejected forms, recognized so they can be diagnosed and fixed up
    ("==", TokenKind::Eq),
    ("?#", TokenKind::Peek),
    ("&&", TokenKind::Amp),
    ("||", TokenKind::Or),
    ("*/", TokenKind::Nothing),
];

/// Keyword lookup. `s` must already be folded to lowercase.
pub fn keyword(s: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match s {
        "after" => KwAfter,
        "all" => KwAll,
        "array" => KwArray,
        "atomic" => KwAtomic,
        "bool" => KwBool,
        "builtin" => KwBuiltin,
        "chp" => KwChp,
        "connect" => KwConnect,
        "const" => KwConst,
        "counter" => KwCounter,
        "default" => KwDefault,
        "delay" => KwDelay,
        "export" => KwExport,
        "false" => KwFalse,
        "field" => KwField,
        "function" => KwFunction,
        "hse" => KwHse,
        "instance" => KwInstance,
        "int" => KwInt,
        "meta" => KwMeta,
        "mod" => KwMod,
        "of" => KwOf,
        "prs" => KwPrs,
        "procedure" => KwProcedure,
        "process" => KwProcess,
        "property" => KwProperty,
        "record" => KwRecord,
        "requires" => KwRequires,
        "res" => KwRes,
        "skip" => KwSkip,
        "symbol" => KwSymbol,
        "type" => KwType,
        "true" => KwTrue,
        "union" => KwUnion,
        "val" => KwVal,
        "valres" => KwValres,
        "var" => KwVar,
        "volatile" => KwVolatile,
        "xor" => KwXor,
        _ => return None,
    })
}

impl TokenKind {
    /// Pretty name for diagnostics ("Expected ...").
    pub fn name(self) -> &'static str {
        use TokenKind::*;
        match self {
            Nothing => "(nothing)",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Caret => "^",
            Tilde => "~",
            Hash => "#",
            Amp => "&",
            Or => "|",
            Lparen => "(",
            Rparen => ")",
            Lbracket => "[",
            Rbracket => "]",
            Lbrace => "{",
            Rbrace => "}",
            Comma => ",",
            Semi => ";",
            Colon => ":",
            Dot => ".",
            Eq => "=",
            Lt => "<",
            Gt => ">",
            Query => "?",
            Bang => "!",
            Assign => ":=",
            Arrow => "->",
            Dots => "..",
            Loop => "*[",
            Rep => "<<",
            RepEnd => ">>",
            Arb => "[]",
            Mutex => "[:]",
            Concat => "++",
            Neq => "!=",
            Lte => "<=",
            Gte => ">=",
            Peek => "#?",
            Varargs => "...",
            KwAfter => "after",
            KwAll => "all",
            KwArray => "array",
            KwAtomic => "atomic",
            KwBool => "bool",
            KwBuiltin => "builtin",
            KwChp => "chp",
            KwConnect => "connect",
            KwConst => "const",
            KwCounter => "counter",
            KwDefault => "default",
            KwDelay => "delay",
            KwExport => "export",
            KwFalse => "false",
            KwField => "field",
            KwFunction => "function",
            KwHse => "hse",
            KwInstance => "instance",
            KwInt => "int",
            KwMeta => "meta",
            KwMod => "mod",
            KwOf => "of",
            KwPrs => "prs",
            KwProcedure => "procedure",
            KwProcess => "process",
            KwProperty => "property",
            KwRecord => "record",
            KwRequires => "requires",
            KwRes => "res",
            KwSkip => "skip",
            KwSymbol => "symbol",
            KwType => "type",
            KwTrue => "true",
            KwUnion => "union",
            KwVal => "val",
            KwValres => "valres",
            KwVar => "var",
            KwVolatile => "volatile",
            KwXor => "xor",
            Id => "identifier",
            IntConst | BigConst => "integer",
            CharConst => "character_constant",
            StringConst => "string",
            SymbolConst => "symbol",
            FloatConst => "float",
            Eof => "end-of-file",
            Newline => "end-of-line",
            Instance => "instance name",
        }
    }
}

/// Payload of a token, matching its kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TokenValue {
    #[default]
    None,
    /// IntConst, CharConst
    Int(i64),
    /// BigConst
    Big(BigInt),
    /// StringConst
    Str(String),
    /// Id, SymbolConst, Instance
    Sym(Symbol),
    /// FloatConst
    Float(f64),
}

impl TokenValue {
    pub fn as_int(&self) -> i64 {
        match self {
            TokenValue::Int(i) => *i,
            _ => 0,
        }
    }

    pub fn as_sym(&self) -> Symbol {
        match self {
            TokenValue::Sym(s) => *s,
            _ => Symbol::EMPTY,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Token {
    pub kind: TokenKind,
    pub val: TokenValue,
    pub lnr: u32,
    /// Column span `[start, end)` into the current line buffer.
    pub start: usize,
    pub end: usize,
}

impl Default for TokenKind {
    fn default() -> Self {
        TokenKind::Nothing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_table_is_lowercase_only() {
        assert_eq!(keyword("process"), Some(TokenKind::KwProcess));
        assert_eq!(keyword("PROCESS"), None);
    }

    #[test]
    fn non_keywords_miss() {
        assert_eq!(keyword("widget"), None);
        assert_eq!(keyword(""), None);
    }

    #[test]
    fn operator_prefixes_come_after_longer_forms() {
        let dots3 = OPERATORS.iter().position(|(s, _)| *s == "...").unwrap();
        let dots2 = OPERATORS.iter().position(|(s, _)| *s == "..").unwrap();
        assert!(dots3 < dots2);
    }

    #[test]
    fn names_match_surface_syntax() {
        assert_eq!(TokenKind::Assign.name(), ":=");
        assert_eq!(TokenKind::Mutex.name(), "[:]");
        assert_eq!(TokenKind::Id.name(), "identifier");
        assert_eq!(TokenKind::Eof.name(), "end-of-file");
    }
}
