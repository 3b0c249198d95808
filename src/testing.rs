//! Class-file and JAR fixtures for unit tests.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::classfile::{
    Attribute, ClassFile, CodeAttribute, Constant, ConstantPool, InnerClass, Member, access,
    write_inner_classes,
};
use crate::ir::{ClassEntry, ClassFlags};
use crate::opcodes;
use crate::scan::ScanOutput;

/// Assembles a class file through the in-crate model.
pub(crate) struct ClassBuilder {
    file: ClassFile,
    inner_classes: Vec<InnerClass>,
}

impl ClassBuilder {
    pub(crate) fn new(name: &str) -> Self {
        let mut pool = ConstantPool::default();
        pool.push(Constant::Unusable).expect("slot zero");
        let this_class = pool.ensure_class(name).expect("this class");
        let super_class = pool.ensure_class("java/lang/Object").expect("super class");
        Self {
            file: ClassFile {
                minor_version: 0,
                major_version: 52,
                constant_pool: pool,
                access_flags: access::PUBLIC | 0x0020,
                this_class,
                super_class,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
            },
            inner_classes: Vec::new(),
        }
    }

    fn pool(&mut self) -> &mut ConstantPool {
        &mut self.file.constant_pool
    }

    fn utf8(&mut self, value: &str) -> u16 {
        self.pool().ensure_utf8(value).expect("utf8 entry")
    }

    pub(crate) fn access(mut self, flags: u16) -> Self {
        self.file.access_flags = flags;
        self
    }

    pub(crate) fn super_class(mut self, name: &str) -> Self {
        self.file.super_class = self.pool().ensure_class(name).expect("super class");
        self
    }

    pub(crate) fn interface(mut self, name: &str) -> Self {
        let index = self.pool().ensure_class(name).expect("interface");
        self.file.interfaces.push(index);
        self
    }

    fn member(&mut self, access_flags: u16, name: &str, descriptor: &str) -> Member {
        Member {
            access_flags,
            name_index: self.utf8(name),
            descriptor_index: self.utf8(descriptor),
            attributes: Vec::new(),
        }
    }

    pub(crate) fn field(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        let field = self.member(access_flags, name, descriptor);
        self.file.fields.push(field);
        self
    }

    pub(crate) fn constant_field(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        value: i32,
    ) -> Self {
        let mut field = self.member(access_flags, name, descriptor);
        let value_index = self
            .pool()
            .push(Constant::Integer(value as u32))
            .expect("integer entry");
        field.attributes.push(Attribute {
            name_index: self.utf8("ConstantValue"),
            info: value_index.to_be_bytes().to_vec(),
        });
        self.file.fields.push(field);
        self
    }

    /// Method with a `Code` attribute holding `code`.
    pub(crate) fn method(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        code: Vec<u8>,
    ) -> Self {
        let mut method = self.member(access_flags, name, descriptor);
        let body = CodeAttribute {
            max_stack: 4,
            max_locals: 8,
            code,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };
        method.attributes.push(Attribute {
            name_index: self.utf8("Code"),
            info: body.to_info(),
        });
        self.file.methods.push(method);
        self
    }

    /// Method without a body, for native and abstract declarations.
    pub(crate) fn declare(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        let method = self.member(access_flags, name, descriptor);
        self.file.methods.push(method);
        self
    }

    /// Adds a method whose body performs one call through `opcode`.
    pub(crate) fn call(mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) -> Self {
        let is_interface = opcode == opcodes::INVOKEINTERFACE;
        let index = self
            .pool()
            .ensure_method_ref(owner, name, descriptor, is_interface)
            .expect("method ref");
        let mut code = vec![opcode];
        code.extend_from_slice(&index.to_be_bytes());
        if is_interface {
            code.extend_from_slice(&[1, 0]);
        }
        code.push(opcodes::RETURN);
        let caller = format!("call{}", self.file.methods.len());
        self.method(access::PUBLIC, &caller, "()V", code)
    }

    pub(crate) fn class_ref(mut self, name: &str) -> Self {
        self.pool().ensure_class(name).expect("class entry");
        self
    }

    pub(crate) fn string(mut self, value: &str) -> Self {
        self.pool().ensure_string(value).expect("string entry");
        self
    }

    /// Class-level runtime-visible annotation without element values.
    pub(crate) fn annotation(self, descriptor: &str) -> Self {
        self.class_attribute("RuntimeVisibleAnnotations", |pool| {
            annotation_info(pool, descriptor)
        })
    }

    /// Adds a class-level attribute whose body is built against the pool.
    pub(crate) fn class_attribute(
        mut self,
        name: &str,
        info: impl FnOnce(&mut ConstantPool) -> Vec<u8>,
    ) -> Self {
        let name_index = self.utf8(name);
        let info = info(self.pool());
        self.file.attributes.push(Attribute { name_index, info });
        self
    }

    /// Adds an attribute to the most recently added method.
    pub(crate) fn method_attribute(
        mut self,
        name: &str,
        info: impl FnOnce(&mut ConstantPool) -> Vec<u8>,
    ) -> Self {
        let name_index = self.utf8(name);
        let info = info(self.pool());
        let method = self.file.methods.last_mut().expect("a method to attach to");
        method.attributes.push(Attribute { name_index, info });
        self
    }

    /// Adds an attribute to the `Code` of the most recently added method.
    pub(crate) fn code_attribute(
        mut self,
        name: &str,
        info: impl FnOnce(&mut ConstantPool) -> Vec<u8>,
    ) -> Self {
        let name_index = self.utf8(name);
        let info = info(self.pool());
        let pool = self.file.constant_pool.clone();
        let method = self.file.methods.last_mut().expect("a method to attach to");
        let index = method.code_index(&pool).expect("method with a body");
        let mut code = CodeAttribute::parse(&method.attributes[index].info).expect("code");
        code.attributes.push(Attribute { name_index, info });
        method.attributes[index].info = code.to_info();
        self
    }

    pub(crate) fn inner_class(
        mut self,
        inner: &str,
        outer: &str,
        simple_name: &str,
        access_flags: u16,
    ) -> Self {
        let record = InnerClass {
            inner_class_info_index: self.pool().ensure_class(inner).expect("inner class"),
            outer_class_info_index: self.pool().ensure_class(outer).expect("outer class"),
            inner_name_index: self.utf8(simple_name),
            access_flags,
        };
        self.inner_classes.push(record);
        self
    }

    pub(crate) fn file(mut self) -> ClassFile {
        if !self.inner_classes.is_empty() {
            let name_index = self.utf8("InnerClasses");
            let info = write_inner_classes(&self.inner_classes);
            self.file.attributes.push(Attribute { name_index, info });
        }
        self.file
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.file().to_bytes()
    }
}

/// Body of a `RuntimeVisibleAnnotations`-shaped attribute holding one
/// annotation without element values.
pub(crate) fn annotation_info(pool: &mut ConstantPool, descriptor: &str) -> Vec<u8> {
    let type_index = pool.ensure_utf8(descriptor).expect("utf8");
    let mut info = 1u16.to_be_bytes().to_vec();
    info.extend_from_slice(&type_index.to_be_bytes());
    info.extend_from_slice(&0u16.to_be_bytes());
    info
}

pub(crate) fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = fs::File::create(path).expect("create jar");
    let mut writer = ZipWriter::new(file);
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(data).expect("write entry");
    }
    writer.finish().expect("finish jar");
}

/// Entry names in archive order with their contents.
pub(crate) fn read_jar(path: &Path) -> Vec<(String, Vec<u8>)> {
    let file = fs::File::open(path).expect("open jar");
    let mut archive = ZipArchive::new(file).expect("read jar");
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).expect("entry");
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("read entry");
        entries.push((entry.name().to_string(), data));
    }
    entries
}

pub(crate) fn read_jar_map(path: &Path) -> BTreeMap<String, Vec<u8>> {
    read_jar(path).into_iter().collect()
}

/// Scan result holding `classes` as if read from a single JAR.
pub(crate) fn scan_output(classes: Vec<Vec<u8>>) -> ScanOutput {
    let source = PathBuf::from("input.jar");
    let mut output = ScanOutput::default();
    for bytes in classes {
        let name = ClassFile::parse(&bytes)
            .expect("fixture class")
            .name()
            .expect("fixture name")
            .to_string();
        output.class_count += 1;
        output.classes.insert(
            name.clone(),
            ClassEntry {
                name,
                bytes,
                source: source.clone(),
                flags: ClassFlags::default(),
            },
        );
    }
    output
}
