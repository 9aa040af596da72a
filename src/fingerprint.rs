use std::fmt;
use std::str::FromStr;

use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use sha2::{
    Digest,
    Sha256,
};

use crate::errors::{
    EngineError,
    Result,
};
use crate::series::{
    round_key,
    Series,
};

pub const FINGERPRINT_BYTES: usize = 20;

const SERIES_TAG: &[u8] = b"specmesh/series/v1";
const IMAGE_TAG: &[u8] = b"specmesh/image/v1";

/// 160-bit content hash of a trace's numeric payload.
///
/// Samples are rounded to 6 decimals before hashing, so traces that differ
/// only by floating noise below 1e-6 share a fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_BYTES]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn from_digest(hasher: Sha256) -> Self {
        let digest = hasher.finalize();
        let mut out = [0u8; FINGERPRINT_BYTES];
        out.copy_from_slice(&digest[..FINGERPRINT_BYTES]);
        Fingerprint(out)
    }
}

fn update_rounded(
    hasher: &mut Sha256,
    values: &[f64],
) {
    for v in values {
        hasher.update(round_key(*v).to_le_bytes());
    }
}

/// Fingerprint of a 1-D series. Since [`Series`] is normalized at
/// construction, the result does not depend on the order samples were
/// ingested in.
pub fn fingerprint_series(series: &Series) -> Fingerprint {
    fingerprint_arrays(series.axis(), series.value())
}

/// Fingerprint over raw axis/value arrays as given.
pub fn fingerprint_arrays(
    axis: &[f64],
    value: &[f64],
) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(SERIES_TAG);
    hasher.update((axis.len() as u64).to_le_bytes());
    hasher.update((value.len() as u64).to_le_bytes());
    update_rounded(&mut hasher, axis);
    update_rounded(&mut hasher, value);
    Fingerprint::from_digest(hasher)
}

/// Pixel buffer of an image overlay. Images are fingerprinted but never
/// downsampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub pixels: Vec<f64>,
    pub shape: Vec<usize>,
    #[serde(default = "default_dtype")]
    pub dtype: String,
}

fn default_dtype() -> String {
    "float64".to_string()
}

impl ImagePayload {
    pub fn new(
        pixels: Vec<f64>,
        shape: Vec<usize>,
        dtype: impl Into<String>,
    ) -> Result<Self> {
        let payload = ImagePayload {
            pixels,
            shape,
            dtype: dtype.into(),
        };
        payload.validate()?;
        Ok(payload)
    }

    pub fn validate(&self) -> Result<()> {
        let expected: usize = self.shape.iter().product();
        if self.shape.is_empty() || expected != self.pixels.len() {
            return Err(EngineError::ImageShape {
                shape: self.shape.clone(),
                pixels: self.pixels.len(),
            });
        }
        Ok(())
    }
}

pub fn fingerprint_image(image: &ImagePayload) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(IMAGE_TAG);
    hasher.update(image.dtype.as_bytes());
    hasher.update((image.shape.len() as u64).to_le_bytes());
    for dim in &image.shape {
        hasher.update((*dim as u64).to_le_bytes());
    }
    update_rounded(&mut hasher, &image.pixels);
    Fingerprint::from_digest(hasher)
}

impl fmt::Display for Fingerprint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| EngineError::InvalidFingerprint(format!("{s}: {e}")))?;
        let bytes: [u8; FINGERPRINT_BYTES] = bytes
            .try_into()
            .map_err(|_| EngineError::InvalidFingerprint(format!("{s}: expected 40 hex digits")))?;
        Ok(Fingerprint(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_tolerance() {
        let a = Series::new(vec![1.0, 2.0, 3.0], vec![0.1, 0.2, 0.3]).unwrap();
        let b = Series::new(vec![1.0, 2.0 + 1e-9, 3.0], vec![0.1, 0.2, 0.3 - 1e-8]).unwrap();
        let c = Series::new(vec![1.0, 2.0, 3.0], vec![0.1, 0.2, 0.30001]).unwrap();
        assert_eq!(fingerprint_series(&a), fingerprint_series(&b));
        assert_ne!(fingerprint_series(&a), fingerprint_series(&c));
    }

    #[test]
    fn test_shape_is_part_of_the_hash() {
        // Same flattened numbers, different split between axis and values.
        let a = fingerprint_arrays(&[1.0, 2.0], &[3.0, 4.0]);
        let b = fingerprint_arrays(&[1.0, 2.0, 3.0], &[4.0]);
        assert_ne!(a, b);

        let img_a = ImagePayload::new(vec![1., 2., 3., 4.], vec![2, 2], "float64").unwrap();
        let img_b = ImagePayload::new(vec![1., 2., 3., 4.], vec![4, 1], "float64").unwrap();
        assert_ne!(fingerprint_image(&img_a), fingerprint_image(&img_b));
    }

    #[test]
    fn test_image_shape_validation() {
        assert!(matches!(
            ImagePayload::new(vec![1., 2., 3.], vec![2, 2], "uint8"),
            Err(EngineError::ImageShape { .. })
        ));
    }

    #[test]
    fn test_hex_roundtrip() {
        let fp = fingerprint_arrays(&[1.0], &[1.0]);
        let hex_str = fp.to_string();
        assert_eq!(hex_str.len(), 40);
        assert_eq!(hex_str.parse::<Fingerprint>().unwrap(), fp);
        assert!("abc".parse::<Fingerprint>().is_err());
        assert!("zz".repeat(20).parse::<Fingerprint>().is_err());
    }
}
