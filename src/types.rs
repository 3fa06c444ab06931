/// Stable record identifier of a loss or finding report.
/// Example: `L-2017-004211`
pub type RecordId = String;
/// Identifier shared by every item exposing the same semantic attribute.
/// Examples: `color`, `weight`, `has_charger`
pub type AttributeId = String;
/// Top-level category identifier.
/// Examples: `electronics`, `bags`
pub type CategoryId = String;
/// Subcategory identifier (unique within its category).
/// Examples: `phone`, `backpack`
pub type SubCategoryId = String;
/// ISO currency code attached to money attributes.
/// Examples: `CHF`, `EUR`
pub type CurrencyCode = String;
