use crate::prelude::*;
use std::os::unix::prelude::FileExt;

/// Positional, blocking access to one engine file.
///
/// The handle is opened per operation and closed on drop. `size` mirrors the file
/// length and is advanced by writes past the end.
#[derive(Debug)]
pub(crate) struct File {
    fd: StdFile,
    path: PathBuf,
    size: u64,
}

impl File {
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file(path, |f| f.create(false).write(true).read(true))
    }

    pub(crate) fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file(path, |f| f.create(true).truncate(true).write(true).read(true))
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn read_exact_at(&self, size: usize, offset: u64) -> Result<BytesMut> {
        let mut buf = BytesMut::zeroed(size);
        self.read_into(&mut buf, offset)?;
        Ok(buf)
    }

    pub(crate) fn read_into(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        trace!("read {}b at {} from {:?}", buf.len(), offset, self.path);
        if offset + buf.len() as u64 > self.size {
            return Err(Error::corrupted(format!(
                "read of {}b at {} past the end of {} ({}b)",
                buf.len(),
                offset,
                self.path.display(),
                self.size
            ))
            .into());
        }
        self.fd
            .read_exact_at(buf, offset)
            .map_err(Error::from)
            .with_context(|| format!("read at {} failed: {}", offset, self.path.display()))
    }

    pub(crate) fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        trace!("write {}b at {} to {:?}", buf.len(), offset, self.path);
        self.fd
            .write_all_at(buf, offset)
            .map_err(Error::from)
            .with_context(|| format!("write at {} failed: {}", offset, self.path.display()))?;
        self.size = self.size.max(offset + buf.len() as u64);
        Ok(())
    }

    /// Appends `buf` at the current end of file and returns the offset it was written at.
    pub(crate) fn write_append_all(&mut self, buf: &[u8]) -> Result<u64> {
        let offset = self.size;
        self.write_all_at(offset, buf)?;
        Ok(offset)
    }

    pub(crate) fn read_i64_at(&self, offset: u64) -> Result<i64> {
        let mut word = [0u8; IX_SIZE as usize];
        self.read_into(&mut word, offset)?;
        Ok(i64::from_le_bytes(word))
    }

    pub(crate) fn write_i64_at(&mut self, offset: u64, value: i64) -> Result<()> {
        self.write_all_at(offset, &value.to_le_bytes())
    }

    /// Reads `[from, size)` in pieces of at most `chunk_size` bytes, handing each piece
    /// and its absolute offset to `f`.
    pub(crate) fn read_chunks<F>(&self, from: u64, chunk_size: usize, mut f: F) -> Result<()>
    where
        F: FnMut(u64, &[u8]) -> Result<()>,
    {
        let chunk_size = chunk_size.max(IX_SIZE as usize) as u64;
        let mut offset = from;
        while offset < self.size {
            let len = (self.size - offset).min(chunk_size) as usize;
            let buf = self.read_exact_at(len, offset)?;
            f(offset, &buf)?;
            offset += len as u64;
        }
        Ok(())
    }

    fn from_file(
        path: impl AsRef<Path>,
        setup: impl Fn(&mut OpenOptions) -> &mut OpenOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let fd = setup(&mut OpenOptions::new())
            .open(path)
            .map_err(Error::from)
            .with_context(|| format!("failed to open file: {}", path.display()))?;
        let size = fd
            .metadata()
            .map_err(Error::from)
            .with_context(|| format!("failed to read metadata: {}", path.display()))?
            .len();
        Ok(Self {
            fd,
            path: path.to_owned(),
            size,
        })
    }
}
