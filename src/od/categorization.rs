use crate::error::{TrafficError, TrafficResult};
use crate::gtu::GtuType;
use crate::route::Route;
use crate::LaneId;
use std::fmt;

/// A dimension that demand can be split by.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Lane,
    GtuType,
    Route,
    /// A user-defined dimension, identified by name.
    Custom(String),
}

/// The value of a category in one dimension.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryValue {
    Lane(LaneId),
    GtuType(GtuType),
    Route(Route),
    Custom { dimension: String, value: String },
}

impl CategoryValue {
    /// The dimension this value belongs to.
    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Lane(_) => Dimension::Lane,
            Self::GtuType(_) => Dimension::GtuType,
            Self::Route(_) => Dimension::Route,
            Self::Custom { dimension, .. } => Dimension::Custom(dimension.clone()),
        }
    }
}

impl fmt::Display for CategoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lane(lane) => write!(f, "{:?}", lane),
            Self::GtuType(gtu_type) => write!(f, "{}", gtu_type),
            Self::Route(route) => write!(f, "Route: {}", route.name()),
            Self::Custom { value, .. } => f.write_str(value),
        }
    }
}

/// An ordered set of distinct dimensions that demand is split by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Categorization {
    name: String,
    dimensions: Vec<Dimension>,
}

impl Categorization {
    /// Creates a categorization. Dimensions must be distinct.
    pub fn new(name: &str, dimensions: Vec<Dimension>) -> TrafficResult<Self> {
        for (i, dimension) in dimensions.iter().enumerate() {
            if dimensions[..i].contains(dimension) {
                return Err(TrafficError::Category(format!(
                    "dimension {:?} occurs more than once in categorization '{}'",
                    dimension, name
                )));
            }
        }
        Ok(Self {
            name: name.to_owned(),
            dimensions,
        })
    }

    /// A categorization without dimensions, for demand that is not split.
    pub fn uncategorized() -> Self {
        Self {
            name: "Uncategorized".to_owned(),
            dimensions: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Returns true if demand is split by the given dimension.
    pub fn entails(&self, dimension: &Dimension) -> bool {
        self.dimensions.contains(dimension)
    }

    /// Returns true if the category has exactly one value for each dimension, in order.
    pub fn accepts(&self, category: &Category) -> bool {
        category.values.len() == self.dimensions.len()
            && category
                .values
                .iter()
                .zip(&self.dimensions)
                .all(|(value, dimension)| value.dimension() == *dimension)
    }
}

impl fmt::Display for Categorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.name, self.dimensions)
    }
}

/// A tuple of values, one per dimension of a categorization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category {
    values: Vec<CategoryValue>,
}

impl Category {
    /// Creates a category of the given categorization.
    ///
    /// # Parameters
    /// * `categorization` - The categorization the values must match, in order and number.
    /// * `values` - One value per dimension.
    pub fn new(categorization: &Categorization, values: Vec<CategoryValue>) -> TrafficResult<Self> {
        let category = Self { values };
        if !categorization.accepts(&category) {
            return Err(TrafficError::Category(format!(
                "values {:?} do not match categorization {}",
                category.values, categorization
            )));
        }
        Ok(category)
    }

    /// The single category of uncategorized demand.
    pub fn uncategorized() -> Self {
        Self { values: vec![] }
    }

    pub fn values(&self) -> &[CategoryValue] {
        &self.values
    }

    /// The value in the given dimension, if the category has one.
    pub fn get(&self, dimension: &Dimension) -> Option<&CategoryValue> {
        self.values.iter().find(|v| v.dimension() == *dimension)
    }

    pub fn lane(&self) -> Option<LaneId> {
        self.values.iter().find_map(|v| match v {
            CategoryValue::Lane(lane) => Some(*lane),
            _ => None,
        })
    }

    pub fn gtu_type(&self) -> Option<&GtuType> {
        self.values.iter().find_map(|v| match v {
            CategoryValue::GtuType(gtu_type) => Some(gtu_type),
            _ => None,
        })
    }

    pub fn route(&self) -> Option<&Route> {
        self.values.iter().find_map(|v| match v {
            CategoryValue::Route(route) => Some(route),
            _ => None,
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}
