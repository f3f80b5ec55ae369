//! The contract a concrete resource type implements to be pooled

/// Creates, validates and disposes of the pooled resource.
///
/// The pool never calls these methods while holding one of its locks, so a
/// slow `create_resource` only delays the caller that triggered it.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::ResourceFactory;
/// use std::convert::Infallible;
///
/// struct Buffers;
///
/// impl ResourceFactory for Buffers {
///     type Resource = Vec<u8>;
///     type Error = Infallible;
///
///     fn create_resource(&self) -> Result<Vec<u8>, Infallible> {
///         Ok(Vec::with_capacity(4096))
///     }
///
///     fn test_resource(&self, buffer: &mut Vec<u8>) -> bool {
///         buffer.capacity() >= 4096
///     }
///
///     fn close_resource(&self, _buffer: Vec<u8>) {}
/// }
/// ```
pub trait ResourceFactory: Send + Sync + 'static {
    type Resource: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establish a new resource.
    fn create_resource(&self) -> Result<Self::Resource, Self::Error>;

    /// Validate a resource; `false` gets it destroyed.
    fn test_resource(&self, resource: &mut Self::Resource) -> bool;

    /// Dispose of a resource. Best effort, must not panic.
    fn close_resource(&self, resource: Self::Resource);

    /// Whether the upstream is currently reachable. Acquisition fails fast
    /// with [`PoolError::Unavailable`](crate::PoolError::Unavailable) while
    /// this returns `false`.
    fn is_available(&self) -> bool {
        true
    }
}
