use anyhow::Result;

/// Rewrites the class names of a generic signature (class, method or field
/// signature) through `map`. Type variables and type-parameter names are left
/// alone. `None` when nothing changed.
pub(crate) fn map_signature<F>(signature: &str, map: F) -> Result<Option<String>>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut walker = Walker::new(signature, map);
    walker.signature()?;
    Ok(walker.finish())
}

/// Internal names of the classes a generic signature mentions, inner classes
/// joined to their outer class with `$`.
pub(crate) fn signature_classes(signature: &str) -> Result<Vec<String>> {
    let mut classes = Vec::new();
    map_signature(signature, |name| {
        classes.push(name.to_string());
        None
    })?;
    Ok(classes)
}

struct Walker<'a, F> {
    source: &'a str,
    position: usize,
    out: String,
    /// End of the source prefix already copied into `out`.
    copied: usize,
    changed: bool,
    map: F,
}

impl<'a, F> Walker<'a, F>
where
    F: FnMut(&str) -> Option<String>,
{
    fn new(source: &'a str, map: F) -> Self {
        Self {
            source,
            position: 0,
            out: String::new(),
            copied: 0,
            changed: false,
            map,
        }
    }

    fn finish(mut self) -> Option<String> {
        if !self.changed {
            return None;
        }
        self.out.push_str(&self.source[self.copied..]);
        Some(self.out)
    }

    fn signature(&mut self) -> Result<()> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.bump();
            while self.peek_required()? != b')' {
                self.java_type()?;
            }
            self.bump();
            if self.peek_required()? == b'V' {
                self.bump();
            } else {
                self.java_type()?;
            }
            while self.peek() == Some(b'^') {
                self.bump();
                self.reference_type()?;
            }
        } else {
            // Field signature, or superclass followed by superinterfaces.
            self.java_type()?;
            while self.peek().is_some() {
                self.reference_type()?;
            }
        }
        if self.peek().is_some() {
            anyhow::bail!("trailing characters in signature {}", self.source);
        }
        Ok(())
    }

    fn type_parameters(&mut self) -> Result<()> {
        self.expect(b'<')?;
        loop {
            self.identifier(b':')?;
            // Class bound, possibly empty.
            self.expect(b':')?;
            if !matches!(self.peek_required()?, b':' | b'>') {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.bump();
                self.reference_type()?;
            }
            if self.peek_required()? == b'>' {
                self.bump();
                return Ok(());
            }
        }
    }

    fn java_type(&mut self) -> Result<()> {
        match self.peek_required()? {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => {
                self.bump();
                Ok(())
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<()> {
        match self.peek_required()? {
            b'L' => self.class_type(),
            b'T' => {
                self.bump();
                self.identifier(b';')?;
                self.bump();
                Ok(())
            }
            b'[' => {
                self.bump();
                self.java_type()
            }
            other => anyhow::bail!(
                "unexpected '{}' in signature {}",
                other as char,
                self.source
            ),
        }
    }

    fn class_type(&mut self) -> Result<()> {
        self.expect(b'L')?;
        let start = self.position;
        let end = self.class_name_end()?;
        self.rename(start, end);
        let mut name = self.source[start..end].to_string();
        self.position = end;
        loop {
            match self.peek_required()? {
                b'<' => self.type_arguments()?,
                b'.' => {
                    self.bump();
                    let inner_start = self.position;
                    let inner_end = self.class_name_end()?;
                    name.push('$');
                    name.push_str(&self.source[inner_start..inner_end]);
                    // Nested names follow their outer class; only report them.
                    let _ = (self.map)(&name);
                    self.position = inner_end;
                }
                b';' => {
                    self.bump();
                    return Ok(());
                }
                other => anyhow::bail!(
                    "unexpected '{}' in signature {}",
                    other as char,
                    self.source
                ),
            }
        }
    }

    fn type_arguments(&mut self) -> Result<()> {
        self.expect(b'<')?;
        while self.peek_required()? != b'>' {
            match self.peek_required()? {
                b'*' => self.bump(),
                b'+' | b'-' => {
                    self.bump();
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.bump();
        Ok(())
    }

    /// End of a class name starting at the current position.
    fn class_name_end(&self) -> Result<usize> {
        let rest = &self.source[self.position..];
        let length = rest
            .find([';', '<', '.'])
            .ok_or_else(|| anyhow::anyhow!("unterminated class type in {}", self.source))?;
        if length == 0 {
            anyhow::bail!("empty class name in signature {}", self.source);
        }
        Ok(self.position + length)
    }

    /// Skips an identifier ending right before `terminator`.
    fn identifier(&mut self, terminator: u8) -> Result<()> {
        let rest = &self.source.as_bytes()[self.position..];
        let length = rest
            .iter()
            .position(|byte| *byte == terminator)
            .ok_or_else(|| anyhow::anyhow!("unterminated identifier in {}", self.source))?;
        if length == 0 {
            anyhow::bail!("empty identifier in signature {}", self.source);
        }
        self.position += length;
        Ok(())
    }

    fn rename(&mut self, start: usize, end: usize) {
        let source = self.source;
        if let Some(renamed) = (self.map)(&source[start..end]) {
            self.out.push_str(&source[self.copied..start]);
            self.out.push_str(&renamed);
            self.copied = end;
            self.changed = true;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.position).copied()
    }

    fn peek_required(&self) -> Result<u8> {
        self.peek()
            .ok_or_else(|| anyhow::anyhow!("truncated signature {}", self.source))
    }

    fn bump(&mut self) {
        self.position += 1;
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let next = self.peek_required()?;
        if next != expected {
            anyhow::bail!(
                "expected '{}' but found '{}' in signature {}",
                expected as char,
                next as char,
                self.source
            );
        }
        self.bump();
        Ok(())
    }
}
