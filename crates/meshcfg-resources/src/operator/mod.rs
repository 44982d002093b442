//! Cluster operator settings: autopilot, the Connect CA, network areas and
//! the license

pub mod area;
pub mod autopilot;
pub mod ca;
pub mod license;

use crate::resource::Resource;

/// Every operator resource type
pub fn resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(autopilot::AutopilotResource),
        Box::new(ca::CertificateAuthorityResource),
        Box::new(area::NetworkAreaResource),
        Box::new(license::LicenseResource),
    ]
}
