//! CSV and binary persistence.
//!
//! CSV: a `rows,cols` record followed by one record per matrix row.
//! Binary: a safetensors container with a single F64 tensor named
//! `matrix`, shape `[rows, cols]`, row-major, plus a `storage` metadata
//! entry naming the layout it was written from.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use hmma::Scalar;
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use tracing::debug;

use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::storage::Layout;

const TENSOR_NAME: &str = "matrix";
const STORAGE_KEY: &str = "storage";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoFormat {
    Csv,
    Binary,
}

fn layout_name<L: Layout>() -> &'static str {
    if L::SYMMETRIC { "symmetric" } else { "dense" }
}

fn parse_field<T: core::str::FromStr>(field: &str, what: &str) -> Result<T> {
    field.parse().map_err(|_| MatrixError::Format(format!("invalid {what}: {field:?}")))
}

impl<S: Scalar, L: Layout> Matrix<S, L> {
    pub fn write<W: io::Write>(&self, out: W, format: IoFormat) -> Result<()> {
        match format {
            IoFormat::Csv => self.write_csv(out),
            IoFormat::Binary => self.write_binary(out),
        }
    }

    /// Replace the contents with the matrix stored at `path`.
    pub fn read<P: AsRef<Path>>(&mut self, path: P, format: IoFormat) -> Result<()> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), ?format, "reading matrix");
        self.read_from(file, format)
    }

    /// Replace the contents with a matrix decoded from `input`. A symmetric
    /// matrix only accepts square, symmetric data.
    pub fn read_from<R: io::Read>(&mut self, input: R, format: IoFormat) -> Result<()> {
        let loaded = match format {
            IoFormat::Csv => read_csv(input)?,
            IoFormat::Binary => read_binary(input)?,
        };
        if L::SYMMETRIC && loaded.is_square() && !loaded.is_symmetric() {
            return Err(MatrixError::Format("data is not symmetric".into()));
        }
        self.assign(&loaded)
    }

    fn write_csv<W: io::Write>(&self, out: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).flexible(true).from_writer(out);
        wtr.write_record([self.rows().to_string(), self.cols().to_string()])?;
        for row in self.iter_rows() {
            wtr.write_record(row.iter().map(|x| x.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_binary<W: io::Write>(&self, mut out: W) -> Result<()> {
        let (rows, cols) = self.shape();
        let bytes: Vec<u8> = self
            .iter_rows()
            .flat_map(|row| row.iter().flat_map(|x| x.to_f64().to_le_bytes()).collect::<Vec<_>>())
            .collect();
        let view = TensorView::new(Dtype::F64, vec![rows, cols], &bytes)?;
        let metadata = HashMap::from([(STORAGE_KEY.to_string(), layout_name::<L>().to_string())]);
        let serialized = safetensors::tensor::serialize([(TENSOR_NAME, view)], &Some(metadata))?;
        out.write_all(&serialized)?;
        Ok(())
    }
}

fn read_csv<S: Scalar, R: io::Read>(input: R) -> Result<Matrix<S>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut records = rdr.records();

    let header = records.next().ok_or_else(|| MatrixError::Format("empty input".into()))??;
    if header.len() != 2 {
        return Err(MatrixError::Format(format!("expected `rows,cols` header, got {} fields", header.len())));
    }
    let rows: usize = parse_field(&header[0], "row count")?;
    let cols: usize = parse_field(&header[1], "column count")?;

    let len = rows
        .checked_mul(cols)
        .ok_or_else(|| MatrixError::Format(format!("{rows}x{cols} does not fit in memory")))?;
    // grows with the data actually present; the header alone is not trusted
    let mut values = Vec::new();
    for (r, record) in records.enumerate() {
        let record = record?;
        if r >= rows {
            return Err(MatrixError::Format(format!("more than {rows} rows")));
        }
        if record.len() != cols {
            return Err(MatrixError::Format(format!("row {r}: expected {cols} values, got {}", record.len())));
        }
        for field in record.iter() {
            values.push(parse_field::<S>(field, "value")?);
        }
    }
    if values.len() != len {
        return Err(MatrixError::Format(format!("expected {rows} rows, got {}", values.len() / cols.max(1))));
    }
    Matrix::from_row_major(rows, cols, &values)
}

fn read_binary<S: Scalar, R: io::Read>(mut input: R) -> Result<Matrix<S>> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;
    let (_, metadata) = SafeTensors::read_metadata(&buf)?;
    if let Some(storage) = metadata.metadata().as_ref().and_then(|m| m.get(STORAGE_KEY)) {
        debug!(storage = storage.as_str(), "binary matrix layout");
    }

    let tensors = SafeTensors::deserialize(&buf)?;
    let view = tensors.tensor(TENSOR_NAME)?;
    if view.dtype() != Dtype::F64 {
        return Err(MatrixError::Format(format!("unsupported dtype {:?}", view.dtype())));
    }
    let &[rows, cols] = view.shape() else {
        return Err(MatrixError::Format(format!("expected a 2-d tensor, got shape {:?}", view.shape())));
    };
    let values: Vec<S> = view
        .data()
        .chunks_exact(8)
        .map(|chunk| {
            let mut b = [0u8; 8];
            b.copy_from_slice(chunk);
            S::from_f64(f64::from_le_bytes(b))
        })
        .collect();
    Matrix::from_row_major(rows, cols, &values)
}
