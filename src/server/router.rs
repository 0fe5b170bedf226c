//! Resolves `a1r/{device-name}/{resource-name}` request paths against the
//! device registry.

use thiserror::Error;

use crate::interfaces::registry::{DeviceLease, DeviceRegistry, ResourceSchema};

/// First path segment of every data route
pub const RESOURCE_SEG1: &str = "a1r";

const SEGMENT_COUNT: usize = 3;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RoutingError {
    #[error("missing URI segment {0}")]
    MissingSegment(usize),
    #[error("empty URI segment {0}")]
    EmptySegment(usize),
    #[error("extra URI segment")]
    ExtraSegment,
    #[error("invalid URI; segment 0")]
    UnexpectedTag,
    #[error("URI segment {0} is not valid UTF-8")]
    NotUtf8(usize),
    #[error("URI segment {0} contains '/'")]
    SlashInSegment(usize),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
}

/// A device and one of its resources, held for one request
pub struct Route<'r, R: DeviceRegistry + ?Sized> {
    pub device: DeviceLease<'r, R>,
    pub resource: ResourceSchema,
}

impl<R: DeviceRegistry + ?Sized> Route<'_, R> {
    pub fn device_name(&self) -> &str {
        &self.device.device().name
    }
}

/// Split and validate a request path, then look up the device and resource.
///
/// The shape of the path is checked before the registry is consulted, so a
/// malformed path never takes a device lease. A lease taken for a device
/// whose resource is missing is released before returning.
pub fn route<'r, R: DeviceRegistry + ?Sized>(
    path: &str,
    registry: &'r R,
) -> Result<Route<'r, R>, RoutingError> {
    log::debug!("URI {path}");
    let [tag, device_name, resource_name] = split_path(path)?;

    if tag != RESOURCE_SEG1 {
        return Err(RoutingError::UnexpectedTag);
    }

    let device = DeviceLease::acquire(registry, device_name)
        .ok_or_else(|| RoutingError::DeviceNotFound(device_name.to_string()))?;

    let resource = device
        .device()
        .find_resource(resource_name)
        .cloned()
        .ok_or_else(|| RoutingError::ResourceNotFound(resource_name.to_string()))?;

    Ok(Route { device, resource })
}

fn split_path(path: &str) -> Result<[&str; SEGMENT_COUNT], RoutingError> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut segments = path.split('/');

    let mut found = [""; SEGMENT_COUNT];
    for (i, slot) in found.iter_mut().enumerate() {
        match segments.next() {
            Some("") if i == 0 && path.is_empty() => return Err(RoutingError::MissingSegment(0)),
            Some("") => return Err(RoutingError::EmptySegment(i)),
            Some(seg) => *slot = seg,
            None => return Err(RoutingError::MissingSegment(i)),
        }
    }
    if segments.next().is_some() {
        return Err(RoutingError::ExtraSegment);
    }
    Ok(found)
}
