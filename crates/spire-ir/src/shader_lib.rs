//! The ShaderLib text format: compiled shader metadata plus per-world source.
//!
//! ```text
//! name Lit
//! paramset "Material" size 32 binding 1
//! {
//!     albedo("albedo") : vector<float, 3> at buffer(0, 12);
//!     tex("tex") : texture<vector<float, 4>, 2> at binding(0 );
//! }
//! source
//! {
//!     vs
//!     binary
//!     {
//!         1, 2, 3,
//!     }
//!     text
//!     {
//! ...source text, kept byte for byte...
//!     }
//! }
//! ```
//!
//! Text blocks are delimited by brace balancing, so the stored source must
//! have balanced braces.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ShaderLibError;
use crate::layout;
use crate::program::{ModuleParameterInstance, ModuleParameterSet};
use crate::types::{
    ArrayLikeKind, BaseType, IlType, PointerLikeKind, StructField, StructType, TextureFlavor,
};

/// Compiled output for one world.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageSource {
    pub binary: Vec<u32>,
    pub text: String,
}

/// A compiled shader as stored on disk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderLibFile {
    pub name: String,
    /// Binding name to parameter set.
    pub parameter_sets: BTreeMap<String, ModuleParameterSet>,
    /// World name to compiled source.
    pub sources: BTreeMap<String, StageSource>,
}

impl ShaderLibFile {
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn from_text(text: &str) -> Result<Self, ShaderLibError> {
        text.parse()
    }
}

// ----------------------------------------------------------------------
// Writing
// ----------------------------------------------------------------------

/// Serialises a type in the ShaderLib notation.
pub fn write_type(out: &mut String, ty: &IlType) {
    match ty {
        IlType::Basic(b) => {
            let _ = write!(out, "basic {}", b.name());
        }
        IlType::Vector { base, size } => {
            let _ = write!(out, "vector<{}, {size}>", base.name());
        }
        IlType::Matrix {
            base,
            rows,
            columns,
        } => {
            let _ = write!(out, "matrix<{}, {rows}, {columns}>", base.name());
        }
        IlType::Texture { base, flavor } => {
            out.push_str("texture<");
            write_type(out, base);
            let _ = write!(out, ", {}>", flavor.bits());
        }
        IlType::SamplerState { comparison } => {
            let _ = write!(out, "SamplerState({})", u8::from(*comparison));
        }
        IlType::Array { base, len } => {
            out.push_str("array(");
            write_type(out, base);
            let _ = write!(out, ", {len})");
        }
        IlType::ArrayLike { base, kind } => {
            out.push_str("array_like(");
            write_type(out, base);
            let _ = write!(out, ", {})", *kind as u32);
        }
        IlType::PointerLike { base, kind } => {
            out.push_str("ptr_like(");
            write_type(out, base);
            let _ = write!(out, ", {})", *kind as u32);
        }
        IlType::Generic { name, base } => {
            let _ = write!(out, "generic {name}(");
            write_type(out, base);
            out.push(')');
        }
        IlType::Record(name) => {
            let _ = write!(out, "record {name}");
        }
        IlType::Struct(s) => {
            let _ = write!(out, "struct {}(", s.name);
            for field in &s.fields {
                let _ = write!(out, "{} : ", field.name);
                write_type(out, &field.ty);
                out.push_str("; ");
            }
            out.push(')');
        }
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

impl fmt::Display for ShaderLibFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let _ = writeln!(out, "name {}", self.name);
        for (binding, set) in &self.parameter_sets {
            out.push_str("paramset ");
            write_quoted(&mut out, binding);
            let _ = writeln!(
                out,
                " size {} binding {}\n{{",
                set.buffer_size, set.descriptor_set_id
            );
            for param in &set.parameters {
                let _ = write!(out, "    {}(", param.name);
                write_quoted(&mut out, &param.key);
                out.push_str(") : ");
                write_type(&mut out, &param.ty);
                out.push_str(" at ");
                match param.buffer_offset {
                    Some(offset) => {
                        let size = layout::std140(&param.ty).map_or(0, |l| l.size);
                        let _ = write!(out, "buffer({offset}, {size})");
                    }
                    None => {
                        out.push_str("binding(");
                        for slot in &param.binding_points {
                            let _ = write!(out, "{slot} ");
                        }
                        out.push(')');
                    }
                }
                out.push_str(";\n");
            }
            out.push_str("}\n");
        }
        out.push_str("source\n{\n");
        for (world, source) in &self.sources {
            let _ = writeln!(out, "    {world}");
            if !source.binary.is_empty() {
                out.push_str("    binary\n    {\n");
                for chunk in source.binary.chunks(8) {
                    out.push_str("       ");
                    for word in chunk {
                        let _ = write!(out, " {word},");
                    }
                    out.push('\n');
                }
                out.push_str("    }\n");
            }
            out.push_str("    text\n    {\n");
            out.push_str(&source.text);
            out.push_str("\n    }\n");
        }
        out.push_str("}\n");
        f.write_str(&out)
    }
}

// ----------------------------------------------------------------------
// Reading
// ----------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Int(&'a str),
    Str(String),
    Punct(char),
    End,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(w) | Self::Int(w) => f.write_str(w),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Punct(c) => write!(f, "{c}"),
            Self::End => f.write_str("end of input"),
        }
    }
}

#[derive(Clone, Copy)]
struct Reader<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
}

type ReadResult<T> = Result<T, ShaderLibError>;

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.rest().chars().next() {
            if !c.is_whitespace() {
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.pos += c.len_utf8();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.rest().chars().next() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn next_token(&mut self) -> ReadResult<Token<'a>> {
        self.skip_whitespace();
        let Some(c) = self.rest().chars().next() else {
            return Ok(Token::End);
        };
        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(Token::Word(
                self.take_while(|c| c.is_ascii_alphanumeric() || c == '_'),
            ));
        }
        if c.is_ascii_digit() || c == '-' {
            let start = self.pos;
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit());
            return Ok(Token::Int(&self.src[start..self.pos]));
        }
        if c == '"' {
            self.pos += 1;
            let mut value = String::new();
            let mut escaped = false;
            loop {
                let Some(c) = self.rest().chars().next() else {
                    return Err(ShaderLibError::UnexpectedEnd("closing '\"'".into()));
                };
                self.pos += c.len_utf8();
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => break,
                    _ => {
                        if c == '\n' {
                            self.line += 1;
                        }
                        escaped = false;
                        value.push(c);
                    }
                }
            }
            return Ok(Token::Str(value));
        }
        self.pos += c.len_utf8();
        Ok(Token::Punct(c))
    }

    fn peek(&self) -> ReadResult<Token<'a>> {
        let mut copy = *self;
        copy.next_token()
    }

    fn error(&self, expected: &str, found: Token<'_>) -> ShaderLibError {
        match found {
            Token::End => ShaderLibError::UnexpectedEnd(expected.into()),
            found => ShaderLibError::Expected {
                line: self.line,
                expected: expected.into(),
                found: found.to_string(),
            },
        }
    }

    fn at_end(&self) -> ReadResult<bool> {
        Ok(self.peek()? == Token::End)
    }

    fn look_ahead_word(&self, word: &str) -> ReadResult<bool> {
        Ok(self.peek()? == Token::Word(word))
    }

    fn look_ahead_punct(&self, c: char) -> ReadResult<bool> {
        Ok(self.peek()? == Token::Punct(c))
    }

    fn expect_punct(&mut self, c: char) -> ReadResult<()> {
        match self.next_token()? {
            Token::Punct(p) if p == c => Ok(()),
            other => Err(self.error(&format!("'{c}'"), other)),
        }
    }

    fn expect_keyword(&mut self, word: &str) -> ReadResult<()> {
        match self.next_token()? {
            Token::Word(w) if w == word => Ok(()),
            other => Err(self.error(&format!("'{word}'"), other)),
        }
    }

    fn read_word(&mut self) -> ReadResult<&'a str> {
        match self.next_token()? {
            Token::Word(w) => Ok(w),
            other => Err(self.error("a name", other)),
        }
    }

    fn read_string(&mut self) -> ReadResult<String> {
        match self.next_token()? {
            Token::Str(s) => Ok(s),
            other => Err(self.error("a string literal", other)),
        }
    }

    fn read_int<T: TryFrom<i64>>(&mut self) -> ReadResult<T> {
        match self.next_token()? {
            Token::Int(text) => text
                .parse::<i64>()
                .ok()
                .and_then(|v| T::try_from(v).ok())
                .ok_or_else(|| ShaderLibError::IntegerOutOfRange {
                    line: self.line,
                    text: text.into(),
                }),
            other => Err(self.error("an integer", other)),
        }
    }

    /// Reads a brace-delimited block verbatim. One newline directly after
    /// `{` and the final newline plus indentation before `}` belong to the
    /// format, not to the text.
    fn read_text_block(&mut self) -> ReadResult<String> {
        self.expect_punct('{')?;
        let start = self.pos;
        let start_line = self.line;
        let mut depth = 0usize;
        let mut end = None;
        for (i, c) in self.rest().char_indices() {
            match c {
                '{' => depth += 1,
                '}' if depth == 0 => {
                    end = Some(start + i);
                    break;
                }
                '}' => depth -= 1,
                '\n' => self.line += 1,
                _ => {}
            }
        }
        let Some(end) = end else {
            return Err(ShaderLibError::UnterminatedText { line: start_line });
        };
        self.pos = end + 1;
        let mut text = &self.src[start..end];
        text = text.strip_prefix('\n').unwrap_or(text);
        if let Some(nl) = text.rfind('\n') {
            if text[nl + 1..].chars().all(|c| c == ' ' || c == '\t') {
                text = &text[..nl];
            }
        }
        Ok(text.to_owned())
    }

    fn read_base_type(&mut self) -> ReadResult<BaseType> {
        self.skip_whitespace();
        let line = self.line;
        let name = self.read_word()?;
        BaseType::from_name(name).ok_or_else(|| ShaderLibError::UnknownType {
            line,
            name: name.into(),
        })
    }

    fn read_type(&mut self) -> ReadResult<IlType> {
        self.skip_whitespace();
        let line = self.line;
        let word = self.read_word()?;
        let ty = match word {
            "basic" => IlType::Basic(self.read_base_type()?),
            "vector" => {
                self.expect_punct('<')?;
                let base = self.read_base_type()?;
                self.expect_punct(',')?;
                let size = self.read_int()?;
                self.expect_punct('>')?;
                IlType::Vector { base, size }
            }
            "matrix" => {
                self.expect_punct('<')?;
                let base = self.read_base_type()?;
                self.expect_punct(',')?;
                let rows = self.read_int()?;
                self.expect_punct(',')?;
                let columns = self.read_int()?;
                self.expect_punct('>')?;
                IlType::Matrix {
                    base,
                    rows,
                    columns,
                }
            }
            "texture" => {
                self.expect_punct('<')?;
                let base = self.read_type()?;
                self.expect_punct(',')?;
                let bits: u32 = self.read_int()?;
                self.expect_punct('>')?;
                let flavor = TextureFlavor::from_bits(bits).ok_or(ShaderLibError::InvalidValue {
                    line,
                    what: "texture flavor",
                    value: bits.into(),
                })?;
                IlType::Texture {
                    base: Box::new(base),
                    flavor,
                }
            }
            "SamplerState" => {
                self.expect_punct('(')?;
                let comparison: u32 = self.read_int()?;
                self.expect_punct(')')?;
                IlType::SamplerState {
                    comparison: comparison != 0,
                }
            }
            "array" => {
                let (base, len) = self.read_wrapped()?;
                IlType::Array {
                    base: Box::new(base),
                    len,
                }
            }
            "array_like" => {
                let (base, kind) = self.read_wrapped()?;
                let kind = ArrayLikeKind::from_index(kind).ok_or(ShaderLibError::InvalidValue {
                    line,
                    what: "array-like kind",
                    value: kind.into(),
                })?;
                IlType::ArrayLike {
                    base: Box::new(base),
                    kind,
                }
            }
            "ptr_like" => {
                let (base, kind) = self.read_wrapped()?;
                let kind =
                    PointerLikeKind::from_index(kind).ok_or(ShaderLibError::InvalidValue {
                        line,
                        what: "pointer-like kind",
                        value: kind.into(),
                    })?;
                IlType::PointerLike {
                    base: Box::new(base),
                    kind,
                }
            }
            "generic" => {
                let name = self.read_word()?.to_owned();
                self.expect_punct('(')?;
                let base = self.read_type()?;
                self.expect_punct(')')?;
                IlType::Generic {
                    name,
                    base: Box::new(base),
                }
            }
            "record" => IlType::Record(self.read_word()?.to_owned()),
            "struct" => {
                let name = self.read_word()?.to_owned();
                self.expect_punct('(')?;
                let mut fields = Vec::new();
                while !self.look_ahead_punct(')')? {
                    let field_name = self.read_word()?.to_owned();
                    self.expect_punct(':')?;
                    let ty = self.read_type()?;
                    self.expect_punct(';')?;
                    fields.push(StructField {
                        name: field_name,
                        ty,
                    });
                }
                self.expect_punct(')')?;
                IlType::Struct(Arc::new(StructType {
                    name,
                    is_intrinsic: false,
                    fields,
                }))
            }
            other => {
                return Err(ShaderLibError::UnknownType {
                    line,
                    name: other.into(),
                });
            }
        };
        Ok(ty)
    }

    /// `( <type> , <int> )`
    fn read_wrapped(&mut self) -> ReadResult<(IlType, u32)> {
        self.expect_punct('(')?;
        let ty = self.read_type()?;
        self.expect_punct(',')?;
        let n = self.read_int()?;
        self.expect_punct(')')?;
        Ok((ty, n))
    }

    fn read_parameter(&mut self) -> ReadResult<ModuleParameterInstance> {
        let name = self.read_word()?.to_owned();
        self.expect_punct('(')?;
        let key = self.read_string()?;
        self.expect_punct(')')?;
        self.expect_punct(':')?;
        let ty = self.read_type()?;
        self.expect_keyword("at")?;
        let mut param = ModuleParameterInstance {
            key,
            name,
            ty,
            buffer_offset: None,
            binding_points: Vec::new(),
        };
        if self.look_ahead_word("binding")? {
            self.next_token()?;
            self.expect_punct('(')?;
            while !self.look_ahead_punct(')')? {
                param.binding_points.push(self.read_int()?);
            }
            self.expect_punct(')')?;
        } else {
            self.expect_keyword("buffer")?;
            self.expect_punct('(')?;
            param.buffer_offset = Some(self.read_int()?);
            if self.look_ahead_punct(',')? {
                self.next_token()?;
                let _size: u32 = self.read_int()?;
            }
            self.expect_punct(')')?;
        }
        self.expect_punct(';')?;
        Ok(param)
    }

    fn read_parameter_set(&mut self) -> ReadResult<ModuleParameterSet> {
        let mut set = ModuleParameterSet {
            binding_name: self.read_string()?,
            descriptor_set_id: -1,
            uniform_buffer_legacy_binding_point: -1,
            ..ModuleParameterSet::default()
        };
        if self.look_ahead_word("size")? {
            self.next_token()?;
            set.buffer_size = self.read_int()?;
        }
        if self.look_ahead_word("binding")? {
            self.next_token()?;
            set.descriptor_set_id = self.read_int()?;
            set.uniform_buffer_legacy_binding_point = set.descriptor_set_id;
        }
        self.expect_punct('{')?;
        while !self.look_ahead_punct('}')? {
            let param = self.read_parameter()?;
            set.parameters.push(param);
        }
        self.expect_punct('}')?;
        Ok(set)
    }

    fn read_sources(&mut self, sources: &mut BTreeMap<String, StageSource>) -> ReadResult<()> {
        self.expect_punct('{')?;
        while !self.look_ahead_punct('}')? {
            let world = self.read_word()?.to_owned();
            let mut source = StageSource::default();
            if self.look_ahead_word("binary")? {
                self.next_token()?;
                self.expect_punct('{')?;
                while !self.look_ahead_punct('}')? {
                    source.binary.push(self.read_int()?);
                    if self.look_ahead_punct(',')? {
                        self.next_token()?;
                    }
                }
                self.expect_punct('}')?;
            }
            if self.look_ahead_word("text")? {
                self.next_token()?;
                source.text = self.read_text_block()?;
            }
            sources.insert(world, source);
        }
        self.expect_punct('}')
    }
}

impl FromStr for ShaderLibFile {
    type Err = ShaderLibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut reader = Reader::new(s);
        let mut file = ShaderLibFile::default();
        while !reader.at_end()? {
            reader.skip_whitespace();
            let line = reader.line;
            match reader.read_word()? {
                "name" => file.name = reader.read_word()?.to_owned(),
                "paramset" => {
                    let set = reader.read_parameter_set()?;
                    file.parameter_sets.insert(set.binding_name.clone(), set);
                }
                "source" => reader.read_sources(&mut file.sources)?,
                other => {
                    return Err(ShaderLibError::UnknownSection {
                        line,
                        name: other.into(),
                    });
                }
            }
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureShape;

    fn sample() -> ShaderLibFile {
        let mut set = ModuleParameterSet {
            binding_name: "Material".into(),
            buffer_size: 32,
            descriptor_set_id: 1,
            uniform_buffer_legacy_binding_point: 1,
            parameters: Vec::new(),
        };
        set.parameters.push(ModuleParameterInstance {
            key: "roughness".into(),
            name: "roughness".into(),
            ty: IlType::FLOAT,
            buffer_offset: Some(0),
            binding_points: Vec::new(),
        });
        set.parameters.push(ModuleParameterInstance {
            key: "tint".into(),
            name: "tint".into(),
            ty: IlType::vector(BaseType::Float, 3),
            buffer_offset: Some(16),
            binding_points: Vec::new(),
        });
        set.parameters.push(ModuleParameterInstance {
            key: "albedoMap".into(),
            name: "albedoMap".into(),
            ty: IlType::Texture {
                base: Box::new(IlType::vector(BaseType::Float, 4)),
                flavor: TextureFlavor::new(TextureShape::Texture2D),
            },
            buffer_offset: None,
            binding_points: vec![3],
        });
        let mut file = ShaderLibFile {
            name: "Lit".into(),
            ..Default::default()
        };
        file.parameter_sets.insert("Material".into(), set);
        file.sources.insert(
            "fs".into(),
            StageSource {
                binary: vec![0x0723_0203, 7, 42],
                text: "float4 main() : SV_Target\n{\n    return float4(1, 0, 0, 1);\n}".into(),
            },
        );
        file
    }

    #[test]
    fn writes_expected_sections() {
        let text = sample().to_text();
        assert!(text.starts_with("name Lit\n"));
        assert!(text.contains("paramset \"Material\" size 32 binding 1"));
        assert!(text.contains("tint(\"tint\") : vector<float, 3> at buffer(16, 12);"));
        assert!(text.contains("albedoMap(\"albedoMap\") : texture<vector<float, 4>, 2> at binding(3 );"));
    }

    #[test]
    fn roundtrip_preserves_model() {
        let file = sample();
        let parsed = ShaderLibFile::from_text(&file.to_text()).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn text_keeps_leading_and_trailing_whitespace() {
        let mut file = sample();
        file.sources.get_mut("fs").unwrap().text = "\n  indented {\n}\n  ".into();
        let parsed = ShaderLibFile::from_text(&file.to_text()).unwrap();
        assert_eq!(parsed.sources["fs"].text, "\n  indented {\n}\n  ");
    }

    #[test]
    fn struct_types_roundtrip() {
        let ty = IlType::Struct(Arc::new(StructType {
            name: "Light".into(),
            is_intrinsic: false,
            fields: vec![
                StructField {
                    name: "dir".into(),
                    ty: IlType::vector(BaseType::Float, 3),
                },
                StructField {
                    name: "shadow".into(),
                    ty: IlType::array(IlType::INT, 4),
                },
            ],
        }));
        let mut text = String::new();
        write_type(&mut text, &ty);
        assert_eq!(
            text,
            "struct Light(dir : vector<float, 3>; shadow : array(basic int, 4); )"
        );
        let mut reader = Reader::new(&text);
        assert_eq!(reader.read_type().unwrap(), ty);
    }

    #[test]
    fn reports_unknown_section() {
        let err = ShaderLibFile::from_text("name A\nbogus").unwrap_err();
        assert_eq!(
            err,
            ShaderLibError::UnknownSection {
                line: 2,
                name: "bogus".into()
            }
        );
    }

    #[test]
    fn reports_unterminated_text() {
        let err = ShaderLibFile::from_text("source { vs text { int x;").unwrap_err();
        assert!(matches!(err, ShaderLibError::UnterminatedText { .. }));
    }
}
