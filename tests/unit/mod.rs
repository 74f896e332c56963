mod valuation_properties;
