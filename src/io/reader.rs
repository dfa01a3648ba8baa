//! Async frame pump from a byte stream into a connector
//!
//! ```no_run
//! use openigtlink_devices::io::forward_frames;
//! use openigtlink_devices::DeviceRegistry;
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> openigtlink_devices::Result<()> {
//! let mut registry = DeviceRegistry::new();
//! let sender = registry.add_connector("scanner");
//! let stream = TcpStream::connect("127.0.0.1:18944").await?;
//! tokio::spawn(async move { forward_frames(stream, sender).await });
//! // ...drive registry.call_periodic_handler() from a timer
//! # Ok(())
//! # }
//! ```

use super::inbox::FrameSender;
use crate::error::{IgtlError, Result};
use crate::protocol::frame::allocate_body;
use crate::protocol::header::Header;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

/// Read one complete frame (header + body)
///
/// Returns `Ok(None)` on a clean end of stream before the first header byte.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut header_buf = vec![0u8; Header::SIZE];
    let first = reader.read(&mut header_buf).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header_buf[first..]).await?;

    let header = Header::decode(&header_buf)?;
    header.validate()?;
    debug!(
        msg_type = header.type_str(),
        device_name = header.device_str(),
        body_size = header.body_size,
        "Received frame header"
    );

    let mut body = allocate_body(&header)?;
    reader.read_exact(&mut body).await?;
    trace!(bytes_read = body.len(), "Frame body received");

    let mut frame = header_buf;
    frame.extend_from_slice(&body);
    Ok(Some(frame))
}

/// Forward frames from `reader` to a connector until end of stream
///
/// Returns the number of frames forwarded. A truncated frame or a closed
/// connector ends the pump with an error.
pub async fn forward_frames<R: AsyncRead + Unpin>(
    mut reader: R,
    sender: FrameSender,
) -> Result<usize> {
    let mut count = 0;
    while let Some(frame) = read_frame(&mut reader).await? {
        sender.send(frame)?;
        count += 1;
    }
    debug!(connector = sender.connector_name(), frames = count, "Stream ended");
    Ok(count)
}

/// True when the error means the peer went away mid-frame
pub fn is_disconnect(err: &IgtlError) -> bool {
    matches!(
        err,
        IgtlError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof
    )
}
