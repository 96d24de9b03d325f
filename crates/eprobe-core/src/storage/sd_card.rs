use embedded_sdmmc::{Mode, SdCard, TimeSource, VolumeIdx, VolumeManager, sdcard::CardType};
use log::error;

use super::{CardKind, LogStorage, StorageError, StorageInfo};

/// SD card backend of the measurement log.
///
/// The card shares its SPI bus with the e-paper panel. Both are driven
/// blocking and strictly one after the other within a cycle, so the bus
/// never sees interleaved transactions.
pub struct SdCardLogStorage<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
    probe: Result<StorageInfo, StorageError>,
}

impl<S, D, T> SdCardLogStorage<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    /// Wrap the card, probing it once before the volume manager takes it.
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Self {
        let probe = Self::probe(&sd_card);
        let volume_mgr = VolumeManager::new(sd_card, ts);

        Self { volume_mgr, probe }
    }

    fn probe(sd_card: &SdCard<S, D>) -> Result<StorageInfo, StorageError> {
        // Reading the size initializes the card
        let size_bytes = sd_card.num_bytes().map_err(|e| {
            error!("Card Mount Failed: {:?}", e);
            StorageError::MountFailed
        })?;

        let kind = match sd_card.get_card_type() {
            None => return Err(StorageError::NoCard),
            Some(CardType::SDHC) => CardKind::Sdhc,
            Some(_) => CardKind::Sdsc,
        };

        Ok(StorageInfo { kind, size_bytes })
    }
}

impl<S, D, T> LogStorage for SdCardLogStorage<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    fn mount(&mut self) -> Result<StorageInfo, StorageError> {
        self.probe
    }

    fn append(&mut self, path: &'static str, line: &[u8]) -> Result<(), StorageError> {
        let volume0 = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|e| {
                error!("Failed to open volume: {:?}", e);
                StorageError::MountFailed
            })?;

        let root_dir = volume0.open_root_dir().map_err(|e| {
            error!("Failed to open root directory: {:?}", e);
            StorageError::OpenFailed(path)
        })?;

        let file = root_dir
            .open_file_in_dir(path, Mode::ReadWriteCreateOrAppend)
            .map_err(|e| {
                error!("Failed to open file for appending: {:?}", e);
                StorageError::OpenFailed(path)
            })?;

        file.write(line).map_err(|e| {
            error!("Append failed: {:?}", e);
            StorageError::WriteFailed
        })?;

        // Resources are closed on drop, but closing explicitly surfaces
        // flush errors
        file.close().map_err(|_| StorageError::WriteFailed)?;
        root_dir.close().map_err(|_| StorageError::WriteFailed)?;
        volume0.close().map_err(|_| StorageError::WriteFailed)?;

        Ok(())
    }
}
