#![forbid(unsafe_code)]

//! Parameter files.
//!
//! Raw layout, all little-endian, one tensor after another:
//!
//! ```text
//! tensor := rank: u32 | dims: u64 * rank | data: f32 * product(dims)
//! file   := W (rank 2: output_dims, input_dims) | b (rank 1: output_dims)
//! ```
//!
//! Bincode snapshots of the whole mapper (name and bandwidth included) are
//! available through `to_bincode` / `from_bincode`.

use std::path::Path;

use tracing::info;

use crate::linear::Affine;
use crate::mapper::RandomFourierFeatures;
use crate::RffError;

fn put_tensor(buf: &mut Vec<u8>, dims: &[usize], data: &[f32]) {
    buf.extend_from_slice(&(dims.len() as u32).to_le_bytes());
    for &d in dims {
        buf.extend_from_slice(&(d as u64).to_le_bytes());
    }
    for v in data {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

/// Encode `W` and `b` with their shape headers.
pub fn encode(mapper: &RandomFourierFeatures) -> Vec<u8> {
    let (d_in, d_out) = (mapper.input_dims(), mapper.output_dims());
    let mut buf = Vec::with_capacity(4 + 16 + 4 + 8 + 4 * (d_out * d_in + d_out));
    put_tensor(&mut buf, &[d_out, d_in], mapper.weights());
    put_tensor(&mut buf, &[d_out], mapper.bias());
    buf
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], RffError> {
        if self.buf.len() < n {
            return Err(RffError::Format(format!(
                "truncated {what}: need {n} bytes, {} left",
                self.buf.len()
            )));
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn u32(&mut self, what: &str) -> Result<u32, RffError> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(b))
    }

    fn u64(&mut self, what: &str) -> Result<u64, RffError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(b))
    }

    fn tensor(&mut self, what: &str, rank: u32) -> Result<(Vec<usize>, Vec<f32>), RffError> {
        let got = self.u32(what)?;
        if got != rank {
            return Err(RffError::Format(format!(
                "{what}: expected rank {rank}, got {got}"
            )));
        }
        let mut dims = Vec::with_capacity(rank as usize);
        for _ in 0..rank {
            let d = self.u64(what)?;
            let d = usize::try_from(d)
                .map_err(|_| RffError::Format(format!("{what}: dimension {d} too large")))?;
            dims.push(d);
        }
        // sizes are checked against the remaining bytes before allocating
        let bytes = dims
            .iter()
            .try_fold(4usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| RffError::Format(format!("{what}: shape {dims:?} overflows")))?;
        let raw = self.take(bytes, what)?;
        let data = raw
            .chunks_exact(4)
            .map(|c| {
                let mut b = [0u8; 4];
                b.copy_from_slice(c);
                f32::from_le_bytes(b)
            })
            .collect();
        Ok((dims, data))
    }
}

/// Decode a parameter buffer produced by `encode`.
pub fn decode(bytes: &[u8]) -> Result<RandomFourierFeatures, RffError> {
    let mut r = Reader { buf: bytes };
    let (w_dims, weights) = r.tensor("weights", 2)?;
    let (b_dims, bias) = r.tensor("bias", 1)?;
    if !r.buf.is_empty() {
        return Err(RffError::Format(format!("{} trailing bytes", r.buf.len())));
    }
    let (d_out, d_in) = match w_dims.as_slice() {
        [rows, cols] => (*rows, *cols),
        _ => return Err(RffError::Format("weights: expected two dimensions".into())),
    };
    if b_dims != [d_out] {
        return Err(RffError::Format(format!(
            "bias shape {b_dims:?} does not match {d_out} weight rows"
        )));
    }
    RandomFourierFeatures::from_params(d_in, weights, bias)
}

/// Write the raw parameter file.
pub fn save<P: AsRef<Path>>(mapper: &RandomFourierFeatures, path: P) -> Result<(), RffError> {
    let bytes = encode(mapper);
    std::fs::write(path.as_ref(), &bytes)?;
    info!(
        path = %path.as_ref().display(),
        rows = mapper.output_dims(),
        cols = mapper.input_dims(),
        bytes = bytes.len(),
        "saved parameters"
    );
    Ok(())
}

/// Read a raw parameter file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<RandomFourierFeatures, RffError> {
    let bytes = std::fs::read(path.as_ref())?;
    let mapper = decode(&bytes)?;
    info!(
        path = %path.as_ref().display(),
        rows = mapper.output_dims(),
        cols = mapper.input_dims(),
        "loaded parameters"
    );
    Ok(mapper)
}

impl RandomFourierFeatures {
    /// Bincode snapshot of the mapper.
    pub fn to_bincode(&self) -> Result<Vec<u8>, RffError> {
        Ok(bincode::serialize(self)?)
    }

    /// Restore a bincode snapshot; shapes are checked again after decoding.
    pub fn from_bincode(bytes: &[u8]) -> Result<Self, RffError> {
        let raw: RandomFourierFeatures = bincode::deserialize(bytes)?;
        let (name, sigma, affine) = raw.into_affine();
        let (d_in, d_out) = (affine.input_dims(), affine.output_dims());
        let (weights, bias) = affine.into_parts();
        let affine = Affine::from_parts(d_in, d_out, weights, bias)?;
        Ok(Self::from_affine(name, sigma, affine))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample() -> RandomFourierFeatures {
        RandomFourierFeatures::with_seed(3, 5, 1.0, 21).unwrap()
    }

    #[test]
    fn header_layout() {
        let m = RandomFourierFeatures::from_params(2, vec![1.0, 2.0], vec![0.5]).unwrap();
        let bytes = encode(&m);
        let mut expected = Vec::new();
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(&1.0f32.to_le_bytes());
        expected.extend_from_slice(&2.0f32.to_le_bytes());
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(&0.5f32.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn decoded_mapper_gives_same_features() {
        let m = sample();
        let back = decode(&encode(&m)).unwrap();
        assert_eq!(back.weights(), m.weights());
        assert_eq!(back.bias(), m.bias());
        assert_eq!(back.sigma(), None);
        let x = [0.4, -0.1, 2.0];
        assert_eq!(back.forward(&x).unwrap(), m.forward(&x).unwrap());
    }

    #[test]
    fn malformed_buffers_are_rejected() {
        let bytes = encode(&sample());
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1]),
            Err(RffError::Format(_))
        ));
        assert!(matches!(decode(&[]), Err(RffError::Format(_))));

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(matches!(decode(&trailing), Err(RffError::Format(_))));

        let mut bad_rank = bytes.clone();
        bad_rank[..4].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(decode(&bad_rank), Err(RffError::Format(_))));

        // bias claims 4 rows while W has 5
        let m = sample();
        let mut buf = Vec::new();
        put_tensor(&mut buf, &[5, 3], m.weights());
        put_tensor(&mut buf, &[4], &m.bias()[..4]);
        assert!(matches!(decode(&buf), Err(RffError::Format(_))));

        let mut huge = Vec::new();
        huge.extend_from_slice(&2u32.to_le_bytes());
        huge.extend_from_slice(&u64::MAX.to_le_bytes());
        huge.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(decode(&huge).is_err());
    }

    #[test]
    fn save_and_load_file() {
        let path = std::env::temp_dir().join(format!("rff_params_{}.bin", std::process::id()));
        let m = sample();
        save(&m, &path).unwrap();
        let back = load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back.weights(), m.weights());
        assert_eq!(back.bias(), m.bias());
    }

    #[test]
    fn bincode_snapshot_keeps_everything() {
        let m = sample().with_name("rff_snapshot");
        let back = RandomFourierFeatures::from_bincode(&m.to_bincode().unwrap()).unwrap();
        assert_eq!(back, m);
        assert!(matches!(
            RandomFourierFeatures::from_bincode(&[1, 2, 3]),
            Err(RffError::Codec(_))
        ));
    }
}
