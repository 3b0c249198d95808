use anyhow::{Context, Result};

const MAGIC: u32 = 0xCAFE_BABE;

/// Access flags shared by classes, fields and methods.
pub(crate) mod access {
    pub(crate) const PUBLIC: u16 = 0x0001;
    pub(crate) const PRIVATE: u16 = 0x0002;
    pub(crate) const PROTECTED: u16 = 0x0004;
    pub(crate) const STATIC: u16 = 0x0008;
    pub(crate) const NATIVE: u16 = 0x0100;
    pub(crate) const ABSTRACT: u16 = 0x0400;
    pub(crate) const SYNTHETIC: u16 = 0x1000;

    /// Clears private/protected and sets public.
    pub(crate) fn promote(flags: u16) -> u16 {
        (flags & !(PRIVATE | PROTECTED)) | PUBLIC
    }
}

/// Big-endian cursor over class-file bytes.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        let bytes = self.bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let high = self.u32()? as u64;
        let low = self.u32()? as u64;
        Ok((high << 32) | low)
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.offset;
        let end = start.checked_add(len).context("class file out of bounds")?;
        let slice = self
            .data
            .get(start..end)
            .context("class file out of bounds")?;
        self.offset = end;
        Ok(slice)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// One constant-pool slot. `Unusable` fills index 0 and the slot after a
/// long or double.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Constant {
    Unusable,
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

/// Resolved field or method reference.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct MemberRef {
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) is_interface: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.u16()?;
        if count == 0 {
            anyhow::bail!("constant pool count must be at least 1");
        }
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);
        while entries.len() < count as usize {
            let index = entries.len();
            let tag = reader.u8()?;
            let constant = match tag {
                1 => {
                    let len = reader.u16()? as usize;
                    Constant::Utf8(reader.bytes(len)?.to_vec())
                }
                3 => Constant::Integer(reader.u32()?),
                4 => Constant::Float(reader.u32()?),
                5 => Constant::Long(reader.u64()?),
                6 => Constant::Double(reader.u64()?),
                7 => Constant::Class {
                    name_index: reader.u16()?,
                },
                8 => Constant::String {
                    string_index: reader.u16()?,
                },
                9 => Constant::Fieldref {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                10 => Constant::Methodref {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                11 => Constant::InterfaceMethodref {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                12 => Constant::NameAndType {
                    name_index: reader.u16()?,
                    descriptor_index: reader.u16()?,
                },
                15 => Constant::MethodHandle {
                    reference_kind: reader.u8()?,
                    reference_index: reader.u16()?,
                },
                16 => Constant::MethodType {
                    descriptor_index: reader.u16()?,
                },
                17 => Constant::Dynamic {
                    bootstrap_method_attr_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap_method_attr_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                19 => Constant::Module {
                    name_index: reader.u16()?,
                },
                20 => Constant::Package {
                    name_index: reader.u16()?,
                },
                _ => anyhow::bail!("unsupported constant pool tag {tag} at index {index}"),
            };
            let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
            entries.push(constant);
            if wide {
                entries.push(Constant::Unusable);
            }
        }
        if entries.len() != count as usize {
            anyhow::bail!("wide constant overflows constant pool");
        }
        Ok(Self { entries })
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u16(out, self.entries.len() as u16);
        for constant in &self.entries {
            match constant {
                Constant::Unusable => {}
                Constant::Utf8(bytes) => {
                    out.push(1);
                    put_u16(out, bytes.len() as u16);
                    out.extend_from_slice(bytes);
                }
                Constant::Integer(value) => {
                    out.push(3);
                    put_u32(out, *value);
                }
                Constant::Float(value) => {
                    out.push(4);
                    put_u32(out, *value);
                }
                Constant::Long(value) => {
                    out.push(5);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Constant::Double(value) => {
                    out.push(6);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Constant::Class { name_index } => {
                    out.push(7);
                    put_u16(out, *name_index);
                }
                Constant::String { string_index } => {
                    out.push(8);
                    put_u16(out, *string_index);
                }
                Constant::Fieldref {
                    class_index,
                    name_and_type_index,
                } => {
                    out.push(9);
                    put_u16(out, *class_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::Methodref {
                    class_index,
                    name_and_type_index,
                } => {
                    out.push(10);
                    put_u16(out, *class_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => {
                    out.push(11);
                    put_u16(out, *class_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                } => {
                    out.push(12);
                    put_u16(out, *name_index);
                    put_u16(out, *descriptor_index);
                }
                Constant::MethodHandle {
                    reference_kind,
                    reference_index,
                } => {
                    out.push(15);
                    out.push(*reference_kind);
                    put_u16(out, *reference_index);
                }
                Constant::MethodType { descriptor_index } => {
                    out.push(16);
                    put_u16(out, *descriptor_index);
                }
                Constant::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    out.push(17);
                    put_u16(out, *bootstrap_method_attr_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    out.push(18);
                    put_u16(out, *bootstrap_method_attr_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::Module { name_index } => {
                    out.push(19);
                    put_u16(out, *name_index);
                }
                Constant::Package { name_index } => {
                    out.push(20);
                    put_u16(out, *name_index);
                }
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[Constant] {
        &self.entries
    }

    pub(crate) fn get(&self, index: u16) -> Result<&Constant> {
        self.entries
            .get(index as usize)
            .with_context(|| format!("constant pool index {index} out of range"))
    }

    pub(crate) fn set(&mut self, index: u16, constant: Constant) -> Result<()> {
        let slot = self
            .entries
            .get_mut(index as usize)
            .with_context(|| format!("constant pool index {index} out of range"))?;
        *slot = constant;
        Ok(())
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(bytes) => std::str::from_utf8(bytes)
                .with_context(|| format!("constant pool entry {index} is not valid UTF-8")),
            _ => anyhow::bail!("constant pool entry {index} is not a UTF-8 entry"),
        }
    }

    pub(crate) fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => anyhow::bail!("constant pool entry {index} is not a class entry"),
        }
    }

    pub(crate) fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => anyhow::bail!("constant pool entry {index} is not a name-and-type entry"),
        }
    }

    /// Resolves a field, method or interface-method reference.
    pub(crate) fn member_ref(&self, index: u16) -> Result<MemberRef> {
        let (class_index, name_and_type_index, is_interface) = match self.get(index)? {
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            }
            | Constant::Methodref {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index, false),
            Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index, true),
            _ => anyhow::bail!("constant pool entry {index} is not a member reference"),
        };
        let owner = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Ok(MemberRef {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_interface,
        })
    }

    pub(crate) fn push(&mut self, constant: Constant) -> Result<u16> {
        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        let needed = if wide { 2 } else { 1 };
        if self.entries.len() + needed > u16::MAX as usize {
            anyhow::bail!("constant pool is full");
        }
        let index = self.entries.len() as u16;
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    fn find(&self, wanted: &Constant) -> Option<u16> {
        self.entries
            .iter()
            .position(|entry| entry == wanted)
            .map(|index| index as u16)
    }

    fn ensure(&mut self, constant: Constant) -> Result<u16> {
        match self.find(&constant) {
            Some(index) => Ok(index),
            None => self.push(constant),
        }
    }

    pub(crate) fn ensure_utf8(&mut self, value: &str) -> Result<u16> {
        self.ensure(Constant::Utf8(value.as_bytes().to_vec()))
    }

    pub(crate) fn ensure_class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.ensure_utf8(name)?;
        self.ensure(Constant::Class { name_index })
    }

    pub(crate) fn ensure_string(&mut self, value: &str) -> Result<u16> {
        let string_index = self.ensure_utf8(value)?;
        self.ensure(Constant::String { string_index })
    }

    pub(crate) fn ensure_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.ensure_utf8(name)?;
        let descriptor_index = self.ensure_utf8(descriptor)?;
        self.ensure(Constant::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    pub(crate) fn ensure_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<u16> {
        let class_index = self.ensure_class(owner)?;
        let name_and_type_index = self.ensure_name_and_type(name, descriptor)?;
        if is_interface {
            self.ensure(Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            })
        } else {
            self.ensure(Constant::Methodref {
                class_index,
                name_and_type_index,
            })
        }
    }
}

/// Attribute kept as raw bytes; only the ones being rewritten get decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Attribute {
    pub(crate) name_index: u16,
    pub(crate) info: Vec<u8>,
}

impl Attribute {
    fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let name_index = reader.u16()?;
        let len = reader.u32()? as usize;
        let info = reader.bytes(len)?.to_vec();
        Ok(Self { name_index, info })
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u16(out, self.name_index);
        put_u32(out, self.info.len() as u32);
        out.extend_from_slice(&self.info);
    }

    pub(crate) fn is_named(&self, pool: &ConstantPool, name: &str) -> bool {
        pool.utf8(self.name_index)
            .map(|value| value == name)
            .unwrap_or(false)
    }
}

pub(crate) fn parse_attributes(reader: &mut ByteReader<'_>) -> Result<Vec<Attribute>> {
    let count = reader.u16()?;
    (0..count).map(|_| Attribute::parse(reader)).collect()
}

fn write_attributes(attributes: &[Attribute], out: &mut Vec<u8>) {
    put_u16(out, attributes.len() as u16);
    for attribute in attributes {
        attribute.write(out);
    }
}

/// A field_info or method_info structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Member {
    pub(crate) access_flags: u16,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<Attribute>,
}

impl Member {
    fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            access_flags: reader.u16()?,
            name_index: reader.u16()?,
            descriptor_index: reader.u16()?,
            attributes: parse_attributes(reader)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u16(out, self.access_flags);
        put_u16(out, self.name_index);
        put_u16(out, self.descriptor_index);
        write_attributes(&self.attributes, out);
    }

    pub(crate) fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str> {
        pool.utf8(self.name_index)
    }

    pub(crate) fn descriptor<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str> {
        pool.utf8(self.descriptor_index)
    }

    pub(crate) fn is(&self, flag: u16) -> bool {
        self.access_flags & flag != 0
    }

    pub(crate) fn code_index(&self, pool: &ConstantPool) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attribute| attribute.is_named(pool, "Code"))
    }
}

fn parse_members(reader: &mut ByteReader<'_>) -> Result<Vec<Member>> {
    let count = reader.u16()?;
    (0..count).map(|_| Member::parse(reader)).collect()
}

fn write_members(members: &[Member], out: &mut Vec<u8>) {
    put_u16(out, members.len() as u16);
    for member in members {
        member.write(out);
    }
}

/// Decoded `Code` attribute body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CodeAttribute {
    pub(crate) max_stack: u16,
    pub(crate) max_locals: u16,
    pub(crate) code: Vec<u8>,
    /// Raw exception table, 8 bytes per handler.
    pub(crate) exception_table: Vec<u8>,
    pub(crate) attributes: Vec<Attribute>,
}

impl CodeAttribute {
    pub(crate) fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(info);
        let max_stack = reader.u16()?;
        let max_locals = reader.u16()?;
        let code_len = reader.u32()? as usize;
        let code = reader.bytes(code_len)?.to_vec();
        let handlers = reader.u16()? as usize;
        let exception_table = reader.bytes(handlers * 8)?.to_vec();
        let attributes = parse_attributes(&mut reader)?;
        if reader.remaining() != 0 {
            anyhow::bail!("trailing bytes in Code attribute");
        }
        Ok(Self {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    pub(crate) fn to_info(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.code.len() + self.exception_table.len());
        put_u16(&mut out, self.max_stack);
        put_u16(&mut out, self.max_locals);
        put_u32(&mut out, self.code.len() as u32);
        out.extend_from_slice(&self.code);
        put_u16(&mut out, (self.exception_table.len() / 8) as u16);
        out.extend_from_slice(&self.exception_table);
        write_attributes(&self.attributes, &mut out);
        out
    }
}

/// One record of an `InnerClasses` attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct InnerClass {
    pub(crate) inner_class_info_index: u16,
    pub(crate) outer_class_info_index: u16,
    pub(crate) inner_name_index: u16,
    pub(crate) access_flags: u16,
}

pub(crate) fn parse_inner_classes(info: &[u8]) -> Result<Vec<InnerClass>> {
    let mut reader = ByteReader::new(info);
    let count = reader.u16()?;
    (0..count)
        .map(|_| {
            Ok(InnerClass {
                inner_class_info_index: reader.u16()?,
                outer_class_info_index: reader.u16()?,
                inner_name_index: reader.u16()?,
                access_flags: reader.u16()?,
            })
        })
        .collect()
}

pub(crate) fn write_inner_classes(classes: &[InnerClass]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + classes.len() * 8);
    put_u16(&mut out, classes.len() as u16);
    for class in classes {
        put_u16(&mut out, class.inner_class_info_index);
        put_u16(&mut out, class.outer_class_info_index);
        put_u16(&mut out, class.inner_name_index);
        put_u16(&mut out, class.access_flags);
    }
    out
}

/// Lossless in-memory class file: unparsed attributes are carried as bytes
/// so untouched parts are written back unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ClassFile {
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) constant_pool: ConstantPool,
    pub(crate) access_flags: u16,
    pub(crate) this_class: u16,
    pub(crate) super_class: u16,
    pub(crate) interfaces: Vec<u16>,
    pub(crate) fields: Vec<Member>,
    pub(crate) methods: Vec<Member>,
    pub(crate) attributes: Vec<Attribute>,
}

impl ClassFile {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let magic = reader.u32()?;
        if magic != MAGIC {
            anyhow::bail!("invalid class file magic 0x{magic:08x}");
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let constant_pool = ConstantPool::parse(&mut reader).context("parse constant pool")?;
        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;
        let interface_count = reader.u16()?;
        let interfaces = (0..interface_count)
            .map(|_| reader.u16())
            .collect::<Result<Vec<_>>>()?;
        let fields = parse_members(&mut reader).context("parse fields")?;
        let methods = parse_members(&mut reader).context("parse methods")?;
        let attributes = parse_attributes(&mut reader).context("parse class attributes")?;
        if reader.remaining() != 0 {
            anyhow::bail!("{} trailing bytes after class file", reader.remaining());
        }
        let class_file = Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        class_file.name().context("resolve this_class")?;
        Ok(class_file)
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, MAGIC);
        put_u16(&mut out, self.minor_version);
        put_u16(&mut out, self.major_version);
        self.constant_pool.write(&mut out);
        put_u16(&mut out, self.access_flags);
        put_u16(&mut out, self.this_class);
        put_u16(&mut out, self.super_class);
        put_u16(&mut out, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            put_u16(&mut out, *interface);
        }
        write_members(&self.fields, &mut out);
        write_members(&self.methods, &mut out);
        write_attributes(&self.attributes, &mut out);
        out
    }

    pub(crate) fn name(&self) -> Result<&str> {
        self.constant_pool.class_name(self.this_class)
    }

    pub(crate) fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(self.super_class).map(Some)
    }

    pub(crate) fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|index| self.constant_pool.class_name(*index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ClassBuilder;

    #[test]
    fn unmodified_class_round_trips_byte_identical() {
        let bytes = ClassBuilder::new("com/foo/A")
            .interface("java/lang/Runnable")
            .field(access::PRIVATE, "count", "J")
            .constant_field(access::STATIC, "LIMIT", "I", 42)
            .method(access::PUBLIC, "run", "()V", vec![0xb1])
            .string("hello")
            .build();

        let parsed = ClassFile::parse(&bytes).expect("parse class");

        assert_eq!(bytes, parsed.to_bytes());
        assert_eq!("com/foo/A", parsed.name().expect("name"));
        assert_eq!(Some("java/lang/Object"), parsed.super_name().expect("super"));
        assert_eq!(
            vec!["java/lang/Runnable"],
            parsed.interface_names().expect("interfaces")
        );
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantPool::default();
        pool.push(Constant::Unusable).expect("slot zero");
        let long_index = pool.push(Constant::Long(7)).expect("push long");
        let next = pool.ensure_utf8("next").expect("push utf8");

        assert_eq!(1, long_index);
        assert_eq!(3, next);
        assert_eq!(&Constant::Unusable, pool.get(2).expect("second slot"));
    }

    #[test]
    fn ensure_reuses_existing_entries() {
        let mut pool = ConstantPool::default();
        pool.push(Constant::Unusable).expect("slot zero");
        let first = pool.ensure_class("a/B").expect("class");
        let second = pool.ensure_class("a/B").expect("class again");
        let method = pool
            .ensure_method_ref("a/B", "run", "()V", false)
            .expect("method ref");

        assert_eq!(first, second);
        let member = pool.member_ref(method).expect("resolve ref");
        assert_eq!("a/B", member.owner);
        assert_eq!("run", member.name);
        assert_eq!("()V", member.descriptor);
        assert!(!member.is_interface);
    }

    #[test]
    fn parse_rejects_bad_magic_and_truncation() {
        assert!(ClassFile::parse(b"nope").is_err());

        let bytes = ClassBuilder::new("com/foo/A").build();
        assert!(ClassFile::parse(&bytes[..bytes.len() - 1]).is_err());

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(ClassFile::parse(&trailing).is_err());
    }

    #[test]
    fn code_attribute_round_trips() {
        let code = CodeAttribute {
            max_stack: 2,
            max_locals: 1,
            code: vec![0x2a, 0xb0],
            exception_table: vec![0, 0, 0, 1, 0, 1, 0, 0],
            attributes: Vec::new(),
        };

        let parsed = CodeAttribute::parse(&code.to_info()).expect("parse code");

        assert_eq!(code, parsed);
    }

    #[test]
    fn promote_makes_members_public() {
        assert_eq!(
            access::PUBLIC | access::STATIC,
            access::promote(access::PRIVATE | access::STATIC)
        );
        assert_eq!(access::PUBLIC, access::promote(access::PROTECTED));
    }
}
