use vantage_model::AssetId;

/// Remembers which assets hold stereo content.
///
/// Spatial assets must always be fetched at original quality because the
/// preview endpoint drops the second plane.
pub trait SpatialClassifier: Send + Sync {
    fn is_known_spatial(&self, id: AssetId) -> bool;

    fn mark_spatial(&self, id: AssetId);
}
