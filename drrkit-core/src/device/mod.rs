// Imaging device models
//
// Source/detector geometry for projections. Only the mobile C-arm is modeled.

mod carm;

pub use carm::{CArmGeometry, CameraProjection, MobileCArm};
