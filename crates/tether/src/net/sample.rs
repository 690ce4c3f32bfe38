use bytes::Bytes;
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::packed::{PackedReader, PackedWriter, WireError};
use crate::frame::ParentRef;

/// Largest encoding: nine fields of at most five bytes.
pub const MAX_SAMPLE_SIZE: usize = 9 * 5;

/// Angular error tolerated after the Euler round trip, away from pitch ±90°.
pub const ROTATION_TOLERANCE_RAD: f32 = 1e-3;

/// One transform observation as sent by the owner. Position is relative to
/// `parent` when the object rides a platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformSample {
    pub timestamp: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub parent: ParentRef,
}

impl TransformSample {
    pub fn new(timestamp: f32, position: Vec3, rotation: Quat, parent: ParentRef) -> Self {
        Self {
            timestamp,
            position,
            rotation,
            parent,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.timestamp.is_finite() && self.position.is_finite() && self.rotation.is_finite()
    }

    /// Rotation as (x, y, z) degrees, composed as yaw * pitch * roll.
    pub fn euler_degrees(&self) -> Vec3 {
        let (y, x, z) = self.rotation.normalize().to_euler(EulerRot::YXZ);
        Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
    }

    pub fn write(&self, writer: &mut PackedWriter) {
        writer.write_f32(self.timestamp);

        writer.write_f32(self.position.x);
        writer.write_f32(self.position.y);
        writer.write_f32(self.position.z);

        let euler = self.euler_degrees();
        writer.write_f32(euler.x);
        writer.write_f32(euler.y);
        writer.write_f32(euler.z);

        writer.write_u32(self.parent.owner_id);
        writer.write_i32(self.parent.slot_index);
    }

    pub fn encode(&self) -> Bytes {
        let mut writer = PackedWriter::with_capacity(MAX_SAMPLE_SIZE);
        self.write(&mut writer);
        writer.finish()
    }

    pub fn read(reader: &mut PackedReader<'_>) -> Result<Self, WireError> {
        let timestamp = reader.read_f32()?;

        let position = Vec3::new(reader.read_f32()?, reader.read_f32()?, reader.read_f32()?);

        let euler = Vec3::new(reader.read_f32()?, reader.read_f32()?, reader.read_f32()?);
        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            euler.y.to_radians(),
            euler.x.to_radians(),
            euler.z.to_radians(),
        );

        let owner_id = reader.read_u32()?;
        let slot_index = reader.read_i32()?;

        Ok(Self {
            timestamp,
            position,
            rotation,
            parent: ParentRef::new(owner_id, slot_index),
        })
    }

    /// Decodes exactly one sample; leftover bytes and NaN or infinite fields
    /// are errors.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut reader = PackedReader::new(data);
        let sample = Self::read(&mut reader)?;
        reader.finish()?;
        if !sample.is_finite() {
            return Err(WireError::NonFinite);
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Largest displacement of a unit axis; approximately the rotation angle.
    fn rotation_error(a: Quat, b: Quat) -> f32 {
        [Vec3::X, Vec3::Y, Vec3::Z]
            .into_iter()
            .map(|axis| (a * axis - b * axis).length())
            .fold(0.0, f32::max)
    }

    fn sample(rotation: Quat, parent: ParentRef) -> TransformSample {
        TransformSample::new(12.375, Vec3::new(1.5, -20.25, 300.125), rotation, parent)
    }

    #[test]
    fn exact_fields_survive() {
        let original = sample(Quat::IDENTITY, ParentRef::new(77, 3));
        let decoded = TransformSample::decode(&original.encode()).unwrap();

        assert_eq!(decoded.timestamp.to_bits(), original.timestamp.to_bits());
        assert_eq!(decoded.position, original.position);
        assert_eq!(decoded.parent, original.parent);
    }

    #[test]
    fn no_parent_sentinel_survives() {
        let original = sample(Quat::IDENTITY, ParentRef::NONE);
        let decoded = TransformSample::decode(&original.encode()).unwrap();
        assert_eq!(decoded.parent, ParentRef::NONE);
        assert!(decoded.parent.is_none());
    }

    #[test]
    fn rotation_within_tolerance() {
        let rotations = [
            Quat::IDENTITY,
            Quat::from_rotation_y(2.5),
            Quat::from_euler(EulerRot::YXZ, -1.2, 0.6, 0.3),
            Quat::from_rotation_z(-3.0) * Quat::from_rotation_x(1.1),
            Quat::from_axis_angle(Vec3::new(1.0, 2.0, 3.0).normalize(), 0.8),
        ];
        for rotation in rotations {
            let decoded = TransformSample::decode(&sample(rotation, ParentRef::NONE).encode())
                .unwrap()
                .rotation;
            let error = rotation_error(decoded, rotation);
            assert!(
                error < ROTATION_TOLERANCE_RAD,
                "{rotation} decoded as {decoded}, error {error}"
            );
        }
    }

    #[test]
    fn encoded_size_is_bounded() {
        let original = TransformSample::new(
            f32::MAX,
            Vec3::splat(f32::MIN),
            Quat::from_rotation_y(1.0),
            ParentRef::new(u32::MAX, i32::MIN),
        );
        assert!(original.encode().len() <= MAX_SAMPLE_SIZE);
    }

    #[test]
    fn truncated_and_padded_payloads_fail() {
        let bytes = sample(Quat::IDENTITY, ParentRef::new(5, 0)).encode();

        for cut in 0..bytes.len() {
            assert_eq!(
                TransformSample::decode(&bytes[..cut]),
                Err(WireError::UnexpectedEnd),
                "cut at {cut}"
            );
        }

        let mut padded = bytes.to_vec();
        padded.push(0);
        assert_eq!(
            TransformSample::decode(&padded),
            Err(WireError::TrailingBytes(1))
        );
    }

    #[test]
    fn nan_position_is_rejected() {
        let mut original = sample(Quat::IDENTITY, ParentRef::NONE);
        original.position.y = f32::NAN;
        assert_eq!(
            TransformSample::decode(&original.encode()),
            Err(WireError::NonFinite)
        );
    }
}
