//! 内容校验和 - 用于判断文件是否变化

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

/// 读取缓冲区大小
const CHUNK_SIZE: usize = 64 * 1024;

/// 计算整个流的 SHA-256，返回小写十六进制字符串
///
/// 会一直读到 EOF。调用方如需再次读取同一文件，需要自行 seek 回起始位置。
pub async fn checksum<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// 计算内存数据的 SHA-256
pub fn checksum_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// 是否为合法的 SHA-256 十六进制字符串
pub fn is_valid_checksum(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
