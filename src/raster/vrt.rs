//! VRT descriptor that attaches a validity mask to a tile
//!
//! The descriptor exposes the four data bands of a freshly cropped tile as
//! bands 1-4 and the rasterized footprint mask as band 5. Materializing it
//! with band 5 registered as the internal mask yields the masked tile.
//! Source files are referenced relative to the descriptor, so the
//! descriptor must live in the same folder as the tile and the mask.

use std::fs;
use std::io::Write;
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::errors::{TilerError, TilerResult};
use crate::raster::bands::COMPOSITE_BAND_COUNT;
use crate::raster::info::RasterInfo;

/// Band index of the mask within the descriptor
pub const MASK_BAND: usize = COMPOSITE_BAND_COUNT + 1;

/// XML description of a 4-band tile plus its 1-bit mask as a 5-band raster
pub struct MaskedTileDescriptor<'a> {
    /// Pixel grid shared by the tile and the mask
    info: &'a RasterInfo,
    /// File name of the cropped tile, relative to the descriptor
    data_file: String,
    /// File name of the mask raster, relative to the descriptor
    mask_file: String,
    /// Block size advertised for the sources
    block_size: u32,
}

impl<'a> MaskedTileDescriptor<'a> {
    /// Create a descriptor for a tile and its mask
    ///
    /// # Arguments
    /// * `info` - Metadata of the cropped tile
    /// * `data_file` - Path of the cropped tile
    /// * `mask_file` - Path of the mask raster
    /// * `block_size` - Internal block size of both sources
    ///
    /// # Returns
    /// The descriptor, or an error if the tile has fewer than four bands
    pub fn new(info: &'a RasterInfo, data_file: &Path, mask_file: &Path, block_size: u32) -> TilerResult<Self> {
        if info.band_count < COMPOSITE_BAND_COUNT {
            return Err(TilerError::GenericError(format!(
                "Cropped tile {} has {} bands, expected {}",
                data_file.display(), info.band_count, COMPOSITE_BAND_COUNT
            )));
        }

        Ok(MaskedTileDescriptor {
            info,
            data_file: file_name(data_file)?,
            mask_file: file_name(mask_file)?,
            block_size,
        })
    }

    /// Render the descriptor as VRT XML
    pub fn to_xml(&self) -> TilerResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        let width = self.info.width.to_string();
        let height = self.info.height.to_string();

        let mut dataset = BytesStart::new("VRTDataset");
        dataset.push_attribute(("rasterXSize", width.as_str()));
        dataset.push_attribute(("rasterYSize", height.as_str()));
        writer.write_event(Event::Start(dataset)).map_err(xml_error)?;

        write_text_element(&mut writer, "GeoTransform", &[], &self.info.geotransform.to_string())?;
        if let Some(projection) = &self.info.projection {
            write_text_element(&mut writer, "SRS", &[], projection)?;
        }

        for band in 1..=COMPOSITE_BAND_COUNT {
            self.write_band(&mut writer, band, &self.data_file, band)?;
        }
        self.write_band(&mut writer, MASK_BAND, &self.mask_file, 1)?;

        writer.write_event(Event::End(BytesEnd::new("VRTDataset"))).map_err(xml_error)?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| TilerError::GenericError(format!("Invalid UTF-8 in VRT descriptor: {}", e)))
    }

    /// Write the descriptor to `path`
    pub fn write_to(&self, path: &Path) -> TilerResult<()> {
        let xml = self.to_xml()?;
        debug!("Writing mask descriptor {}", path.display());
        fs::write(path, xml)?;
        Ok(())
    }

    /// Write one `VRTRasterBand` backed by a single source band
    fn write_band<W: Write>(
        &self,
        writer: &mut Writer<W>,
        band: usize,
        source_file: &str,
        source_band: usize,
    ) -> TilerResult<()> {
        let band_index = band.to_string();
        let source_band = source_band.to_string();
        let width = self.info.width.to_string();
        let height = self.info.height.to_string();
        let block = self.block_size.to_string();

        let mut element = BytesStart::new("VRTRasterBand");
        element.push_attribute(("dataType", "Byte"));
        element.push_attribute(("band", band_index.as_str()));
        writer.write_event(Event::Start(element)).map_err(xml_error)?;
        writer.write_event(Event::Start(BytesStart::new("SimpleSource"))).map_err(xml_error)?;

        write_text_element(writer, "SourceFilename", &[("relativeToVRT", "1")], source_file)?;
        write_text_element(writer, "SourceBand", &[], &source_band)?;
        write_empty_element(writer, "SourceProperties", &[
            ("RasterXSize", width.as_str()),
            ("RasterYSize", height.as_str()),
            ("DataType", "Byte"),
            ("BlockXSize", block.as_str()),
            ("BlockYSize", block.as_str()),
        ])?;

        let rect = [
            ("xOff", "0"),
            ("yOff", "0"),
            ("xSize", width.as_str()),
            ("ySize", height.as_str()),
        ];
        write_empty_element(writer, "SrcRect", &rect)?;
        write_empty_element(writer, "DstRect", &rect)?;

        writer.write_event(Event::End(BytesEnd::new("SimpleSource"))).map_err(xml_error)?;
        writer.write_event(Event::End(BytesEnd::new("VRTRasterBand"))).map_err(xml_error)?;
        Ok(())
    }
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> TilerResult<()> {
    let mut start = BytesStart::new(name);
    for &attribute in attributes {
        start.push_attribute(attribute);
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_error)?;
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_error)?;
    Ok(())
}

fn write_empty_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
) -> TilerResult<()> {
    let mut element = BytesStart::new(name);
    for &attribute in attributes {
        element.push_attribute(attribute);
    }
    writer.write_event(Event::Empty(element)).map_err(xml_error)?;
    Ok(())
}

fn file_name(path: &Path) -> TilerResult<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| TilerError::GenericError(format!("Path has no file name: {}", path.display())))
}

fn xml_error<E: std::fmt::Display>(error: E) -> TilerError {
    TilerError::GenericError(format!("Failed to write VRT descriptor: {}", error))
}
