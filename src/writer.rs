//! Test-only counterpart to [`crate::loader`]: assembles byte streams in the
//! loader's wire format, so loader and engine tests can build fixtures
//! without hand-counting byte offsets.

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.push(s.len() as u8);
    out.extend_from_slice(s.as_bytes());
}

#[derive(Default)]
pub struct ModuleWriter {
    num_types: u8,
    types_bytes: Vec<u8>,
    num_consts: u8,
    consts_bytes: Vec<u8>,
}

impl ModuleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a simple type (kind `1`) with the given upper-type names.
    pub fn simple_type(&mut self, name: &str, upper: Vec<&str>) {
        self.num_types += 1;
        self.types_bytes.push(1);
        write_str(&mut self.types_bytes, name);
        self.types_bytes.push(upper.len() as u8);
        for u in upper {
            write_str(&mut self.types_bytes, u);
        }
    }

    /// Append a function type (kind `2`) describing a callable signature.
    pub fn function_type(&mut self, name: &str, return_type: &str, params: Vec<&str>) {
        self.num_types += 1;
        self.types_bytes.push(2);
        write_str(&mut self.types_bytes, name);
        write_str(&mut self.types_bytes, return_type);
        self.types_bytes.push(params.len() as u8);
        for p in params {
            write_str(&mut self.types_bytes, p);
        }
    }

    /// Pool index the next constant pushed with [`ModuleWriter::function`] or
    /// [`ModuleWriter::number`] will land at, once the three built-ins are
    /// prepended by the loader.
    pub fn next_const_index(&self) -> usize {
        3 + self.num_consts as usize
    }

    /// Append a function-typed constant (kind `3`) with a fixed-size var
    /// list and raw bytecode body.
    pub fn function(
        &mut self,
        name: &str,
        type_name: &str,
        op_stack_size: u8,
        vars: Vec<(&str, &str)>,
        bytecode: &[u8],
    ) {
        self.num_consts += 1;
        self.consts_bytes.push(3);
        write_str(&mut self.consts_bytes, name);
        write_str(&mut self.consts_bytes, type_name);
        self.consts_bytes.push(op_stack_size);
        self.consts_bytes.push(vars.len() as u8);
        for (vname, vtype) in vars {
            write_str(&mut self.consts_bytes, vname);
            write_str(&mut self.consts_bytes, vtype);
        }
        self.consts_bytes.push(bytecode.len() as u8);
        self.consts_bytes.extend_from_slice(bytecode);
    }

    /// Append a number constant (kind `1`).
    pub fn number(&mut self, value: u8) {
        self.num_consts += 1;
        self.consts_bytes.push(1);
        self.consts_bytes.push(value);
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        write_str(&mut out, "types");
        out.push(self.num_types);
        out.extend_from_slice(&self.types_bytes);
        write_str(&mut out, "consts");
        out.push(self.num_consts);
        out.extend_from_slice(&self.consts_bytes);
        out
    }
}
